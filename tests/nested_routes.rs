//! Nested composition from a root `index`/`router` module.

mod common;

use axum::extract::Request;
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode};
use axum::middleware::Next;
use axum::response::IntoResponse;
use axum::Router;
use common::{get, send, ProjectFixture};
use route_composer::routing::Arg;
use route_composer::{
    mount_routes, Endpoint, ErrorResponder, Filter, Module, ModuleRegistry, Node, RouteError, RouterComposer, ServerConfig,
};

fn mount(fixture: &ProjectFixture, registry: ModuleRegistry<()>) -> Result<Router, RouteError> {
    mount_routes(
        &fixture.project(),
        &ServerConfig::default(),
        Router::new(),
        registry.into_resolver(),
    )
}

/// Appends `tag` to the `x-chain` request header.
fn tag(tag: &'static str) -> Filter {
    Filter::new(move |mut request: Request, next: Next| async move {
        let chain = match request.headers().get("x-chain").and_then(|v| v.to_str().ok()) {
            Some(existing) => format!("{existing},{tag}"),
            None => tag.to_owned(),
        };
        request
            .headers_mut()
            .insert("x-chain", HeaderValue::from_str(&chain).unwrap());
        next.run(request).await
    })
}

fn echo_chain() -> Endpoint<()> {
    Endpoint::new(|headers: HeaderMap| async move {
        headers
            .get("x-chain")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_owned()
    })
}

fn users_registry() -> ModuleRegistry<()> {
    ModuleRegistry::<()>::new()
        .routes("routes/index", |r| {
            r.route("users", "users")?;
            Ok(())
        })
        .routes("routes/users/index", |r| {
            r.get("/", Endpoint::new(|| async { "all users" }))?;
            r.get("/{id}", Endpoint::new(|| async { "one user" }))?;
            Ok(())
        })
}

#[tokio::test]
async fn test_users_directory_mounts_at_users() {
    let fixture = ProjectFixture::new();
    fixture.file("routes/index.rs").file("routes/users/index.rs");

    let app = mount(&fixture, users_registry()).unwrap();

    assert_eq!(get(&app, "/users").await, (StatusCode::OK, "all users".to_owned()));
    assert_eq!(get(&app, "/users/42").await, (StatusCode::OK, "one user".to_owned()));
    assert_eq!(get(&app, "/").await.0, StatusCode::NOT_FOUND);
}

#[test]
fn test_child_composer_mount_path() {
    let fixture = ProjectFixture::new();
    fixture.file("routes/index.rs").file("routes/users/index.rs");

    let mut node = Node::new(fixture.root().join("routes"), users_registry().into_resolver()).with_key_prefix("routes");
    node.traverse().unwrap();

    let mut root = RouterComposer::new(&node).unwrap();
    let index = root.route_index("index").unwrap();
    let users = index.child("users").unwrap();

    assert_eq!(index.mount_path(), "/");
    assert_eq!(users.mount_path(), "/users");
    assert_eq!(users.node().unwrap().location().unwrap(), fixture.root().join("routes/users"));

    root.destroy();
    assert!(root.child("/").is_err());

    node.destroy();
    assert!(node.get("users").is_err());
}

#[tokio::test]
async fn test_router_file_is_root_when_index_is_absent() {
    let fixture = ProjectFixture::new();
    fixture.file("routes/router.rs");

    let registry = ModuleRegistry::<()>::new().routes("routes/router", |r| {
        r.get("/health", Endpoint::new(|| async { "ok" }))?;
        Ok(())
    });
    let app = mount(&fixture, registry).unwrap();

    assert_eq!(get(&app, "/health").await, (StatusCode::OK, "ok".to_owned()));
}

#[test]
fn test_missing_root_router_is_a_configuration_error() {
    let fixture = ProjectFixture::new();
    fixture.file("routes/users/index.rs");

    let err = mount(&fixture, users_registry()).unwrap_err();
    assert!(matches!(err, RouteError::Configuration(_)));
    assert!(err.to_string().contains("'index' or 'router'"));
}

#[test]
fn test_missing_routes_directory_is_a_configuration_error() {
    let fixture = ProjectFixture::new();

    let err = mount(&fixture, users_registry()).unwrap_err();
    assert!(matches!(err, RouteError::Configuration(_)));
}

#[test]
fn test_route_to_missing_directory_fails_startup() {
    let fixture = ProjectFixture::new();
    fixture.file("routes/index.rs");

    let registry = ModuleRegistry::<()>::new().routes("routes/index", |r| {
        r.route("missing-folder", Module::routes(|_| Ok(())))?;
        Ok(())
    });

    match mount(&fixture, registry).unwrap_err() {
        RouteError::NotFound { name, .. } => assert_eq!(name, "missing-folder"),
        other => panic!("expected not found, got {other:?}"),
    }
}

#[tokio::test]
async fn test_handler_name_selects_directory_when_route_name_has_none() {
    let fixture = ProjectFixture::new();
    fixture.file("routes/index.rs").file("routes/accounts/index.rs");

    let registry = ModuleRegistry::<()>::new()
        .routes("routes/index", |r| {
            r.route("users", "accounts")?;
            Ok(())
        })
        .routes("routes/accounts/index", |r| {
            r.get("/", Endpoint::new(|| async { "accounts" }))?;
            Ok(())
        });
    let app = mount(&fixture, registry).unwrap();

    assert_eq!(get(&app, "/users").await, (StatusCode::OK, "accounts".to_owned()));
    assert_eq!(get(&app, "/accounts").await.0, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_controller_fills_child_router() {
    let fixture = ProjectFixture::new();
    fixture.file("routes/index.rs").file("routes/reports/index.rs");

    let registry = ModuleRegistry::<()>::new()
        .routes("routes/index", |r| {
            r.route("reports", "reports")?;
            Ok(())
        })
        .controller("routes/reports/index", |router, _filters| {
            router.route("/daily", axum::routing::get(|| async { "daily" }))
        });
    let app = mount(&fixture, registry).unwrap();

    assert_eq!(get(&app, "/reports/daily").await, (StatusCode::OK, "daily".to_owned()));
}

#[tokio::test]
async fn test_middleware_runs_in_registration_order() {
    let fixture = ProjectFixture::new();
    fixture.file("routes/index.rs");

    let registry = ModuleRegistry::<()>::new().routes("routes/index", |r| {
        r.middleware(tag("a"))?.middleware(tag("b"))?;
        r.get("/", echo_chain())?;
        r.get(
            "/guarded",
            vec![Arg::from(tag("c")), Arg::from(tag("d")), Arg::from(echo_chain())],
        )?;
        Ok(())
    });
    let app = mount(&fixture, registry).unwrap();

    assert_eq!(get(&app, "/").await.1, "a,b");
    assert_eq!(get(&app, "/guarded").await.1, "a,b,c,d");
}

#[tokio::test]
async fn test_scoped_middleware_only_touches_its_prefix() {
    let fixture = ProjectFixture::new();
    fixture.file("routes/index.rs");

    let deny = Filter::new(|_request: Request, _next: Next| async { StatusCode::FORBIDDEN.into_response() });
    let registry = ModuleRegistry::<()>::new().routes("routes/index", move |r| {
        r.middleware_at("/admin", deny.clone())?;
        r.get("/admin/panel", Endpoint::new(|| async { "panel" }))?;
        r.get("/administrator", Endpoint::new(|| async { "lookalike" }))?;
        r.get("/public", Endpoint::new(|| async { "public" }))?;
        Ok(())
    });
    let app = mount(&fixture, registry).unwrap();

    assert_eq!(get(&app, "/admin/panel").await.0, StatusCode::FORBIDDEN);
    assert_eq!(get(&app, "/administrator").await, (StatusCode::OK, "lookalike".to_owned()));
    assert_eq!(get(&app, "/public").await, (StatusCode::OK, "public".to_owned()));
}

#[tokio::test]
async fn test_error_responder_rewrites_failures_only() {
    let fixture = ProjectFixture::new();
    fixture.file("routes/index.rs");

    let registry = ModuleRegistry::<()>::new().routes("routes/index", |r| {
        r.middleware(ErrorResponder::new(|response| {
            (response.status(), "something went wrong").into_response()
        }))?;
        r.get("/boom", Endpoint::new(|| async { StatusCode::INTERNAL_SERVER_ERROR }))?;
        r.get("/fine", Endpoint::new(|| async { "fine" }))?;
        Ok(())
    });
    let app = mount(&fixture, registry).unwrap();

    assert_eq!(
        get(&app, "/boom").await,
        (StatusCode::INTERNAL_SERVER_ERROR, "something went wrong".to_owned())
    );
    assert_eq!(get(&app, "/fine").await, (StatusCode::OK, "fine".to_owned()));
}

#[tokio::test]
async fn test_verbs_and_conflicts() {
    let fixture = ProjectFixture::new();
    fixture.file("routes/index.rs");

    let registry = ModuleRegistry::<()>::new().routes("routes/index", |r| {
        r.get("/items", Endpoint::new(|| async { "list" }))?;
        r.post("/items", Endpoint::new(|| async { StatusCode::CREATED }))?;
        assert!(r.all("/items", Endpoint::new(|| async { "any" })).is_err());
        assert!(r.get("/items/:id", Endpoint::new(|| async { "legacy" })).is_err());
        Ok(())
    });
    let app = mount(&fixture, registry).unwrap();

    assert_eq!(get(&app, "/items").await, (StatusCode::OK, "list".to_owned()));
    let (status, _, _) = send(&app, Method::POST, "/items", &[]).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _, _) = send(&app, Method::DELETE, "/items", &[]).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_hidden_and_unresolvable_files_are_ignored() {
    let fixture = ProjectFixture::new();
    fixture
        .file("routes/index.rs")
        .file("routes/.index.rs")
        .file("routes/README.md")
        .file("routes/users/index.rs");

    let app = mount(&fixture, users_registry()).unwrap();

    assert_eq!(get(&app, "/users").await.0, StatusCode::OK);
}

#[test]
fn test_controller_colliding_with_parent_route_fails_startup() {
    let fixture = ProjectFixture::new();
    fixture.file("routes/index.rs").file("routes/users/index.rs");

    let registry = ModuleRegistry::<()>::new()
        .routes("routes/index", |r| {
            r.get("/users", Endpoint::new(|| async { "parent" }))?;
            r.route("users", "users")?;
            Ok(())
        })
        .controller("routes/users/index", |router, _filters| {
            router.route("/", axum::routing::get(|| async { "controller" }))
        });

    assert!(matches!(mount(&fixture, registry).unwrap_err(), RouteError::Validation(_)));
}

#[test]
fn test_routes_below_a_controller_are_rejected() {
    let fixture = ProjectFixture::new();
    fixture.file("routes/index.rs").file("routes/users/index.rs");

    let registry = ModuleRegistry::<()>::new()
        .routes("routes/index", |r| {
            r.route("users", "users")?;
            r.get("/users/{id}", Endpoint::new(|| async { "parent" }))?;
            Ok(())
        })
        .controller("routes/users/index", |router, _filters| {
            router.route("/{id}", axum::routing::get(|| async { "controller" }))
        });

    assert!(matches!(mount(&fixture, registry).unwrap_err(), RouteError::Validation(_)));
}

#[tokio::test]
async fn test_routes_and_filters_with_the_same_name_stay_apart() {
    let fixture = ProjectFixture::new();
    fixture
        .file("routes/index.rs")
        .file("routes/auth.rs")
        .file("filters/auth.rs");

    let deny = Filter::new(|_request: Request, _next: Next| async { StatusCode::FORBIDDEN.into_response() });
    let registry = ModuleRegistry::<()>::new()
        .routes("routes/index", |r| {
            let auth = r.filters().get("auth").cloned().expect("auth filter is collected");
            r.get("/", "auth")?;
            r.get("/guarded", vec![Arg::from(auth), Arg::from("auth")])?;
            Ok(())
        })
        .endpoint("routes/auth", || async { "route auth" })
        .filter("filters/auth", deny);
    let app = mount(&fixture, registry).unwrap();

    assert_eq!(get(&app, "/").await, (StatusCode::OK, "route auth".to_owned()));
    assert_eq!(get(&app, "/guarded").await.0, StatusCode::FORBIDDEN);
}
