use std::net::{IpAddr, SocketAddr};

use axum::{
    Router,
    routing::{get, post},
};
use groupfinds_backend::{AppState, config::Config, middleware::log_errors, routes};
use sqlx::Executor;
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // 初始化日志
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 加载配置
    let config = Config::from_env().expect("Failed to load configuration");

    #[cfg(debug_assertions)]
    tracing::info!("Running in debug mode with CORS enabled");

    #[cfg(not(debug_assertions))]
    tracing::info!("Running in production mode with CORS disabled");

    // 设置数据库连接池
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                conn.execute("SET application_name = 'groupfinds_backend';")
                    .await?;
                Ok(())
            })
        })
        .connect(&config.database_url)
        .await
        .expect("Failed to connect to Postgres");

    // 设置应用状态
    let state = AppState {
        pool,
        config: config.clone(),
    };

    // 战利品展示路由
    let find_routes = Router::new()
        .route("/finds/{group_id}", get(routes::find::list_finds))
        .route("/finds/create", post(routes::find::create_find))
        .route("/finds/delete", post(routes::find::delete_find))
        .route("/finds/react", post(routes::find::add_reaction))
        .route("/finds/unreact", post(routes::find::remove_reaction));

    // 分享物品路由
    let have_item_routes = Router::new()
        .route(
            "/have-items/{group_id}",
            get(routes::have_item::list_have_items),
        )
        .route(
            "/have-items/counts/{group_id}",
            get(routes::have_item::get_counts),
        )
        .route(
            "/have-items/create",
            post(routes::have_item::create_have_item),
        )
        .route(
            "/have-items/reserve",
            post(routes::have_item::reserve_item),
        )
        .route(
            "/have-items/release",
            post(routes::have_item::release_item),
        )
        .route(
            "/have-items/delete",
            post(routes::have_item::delete_have_item),
        );

    // 创建基础路由
    let router = Router::new().nest(
        &config.api_base_uri.clone(),
        Router::new().merge(find_routes).merge(have_item_routes),
    );

    // 添加日志中间件
    let router = router.layer(axum::middleware::from_fn(log_errors));

    // 根据编译模式决定是否添加CORS
    #[cfg(debug_assertions)]
    let router = {
        tracing::debug!("Adding CORS layer for development mode");
        router.layer(CorsLayer::permissive())
    };

    // 添加应用状态
    let app = router.with_state(state.clone());

    // 启动服务器
    let addr = SocketAddr::new(
        state.config.server_host.parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid server_host, falling back to dual-stack default");
            IpAddr::V6(std::net::Ipv6Addr::UNSPECIFIED)
        }),
        state.config.server_port,
    );
    tracing::info!("Server listening on {}", addr);
    axum::serve(
        tokio::net::TcpListener::bind(&addr)
            .await
            .expect("Failed to bind"),
        app,
    )
    .await
    .expect("Failed to start server");
}
