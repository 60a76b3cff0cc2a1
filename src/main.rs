use axum::http::HeaderValue;
use file_manager_rust::{
    config::{AppConfig, LogConfig, DEFAULT_CONFIG_PATH},
    logging, AppState,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};
use tracing::{info, warn};

/// 加载日志配置
///
/// 日志系统要先于完整配置初始化，这里只读取 [log] 段，失败时用默认值
async fn load_log_config() -> LogConfig {
    if let Ok(content) = tokio::fs::read_to_string(DEFAULT_CONFIG_PATH).await {
        if let Ok(config) = toml::from_str::<toml::Value>(&content) {
            if let Some(log_table) = config.get("log") {
                if let Ok(log_config) = log_table.clone().try_into::<LogConfig>() {
                    return log_config;
                }
            }
        }
    }
    LogConfig::default()
}

/// 根据配置构建 CORS 层
fn cors_layer(origins: &[String]) -> CorsLayer {
    let base = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.iter().any(|o| o == "*") {
        return base.allow_origin(Any);
    }

    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                warn!("忽略无效的 CORS 源: {}", o);
                None
            }
        })
        .collect();
    base.allow_origin(parsed)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 日志守卫必须存活到进程结束
    let log_config = load_log_config().await;
    let _log_guard = logging::init_logging(&log_config);

    info!("File Manager Rust v{} 启动中...", env!("CARGO_PKG_VERSION"));

    let config = AppConfig::load(DEFAULT_CONFIG_PATH).await;
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let public_dir = config.server.public_dir.clone();
    let cors = cors_layer(&config.server.cors_origins);

    let app_state = AppState::new(config);
    info!("应用状态初始化完成");

    let middleware = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    let mut app = file_manager_rust::build_router(app_state);

    // 前端静态资源（可选）
    match public_dir {
        Some(dir) if dir.is_dir() => {
            info!("静态资源目录: {:?}", dir);
            let index = dir.join("index.html");
            app = app.fallback_service(ServeDir::new(&dir).not_found_service(ServeFile::new(index)));
        }
        Some(dir) => warn!("静态资源目录不存在，已跳过: {:?}", dir),
        None => {}
    }

    let app = app.layer(middleware);

    info!("服务器启动在: http://{}", addr);
    info!("API 基础路径: http://{}/api", addr);
    info!("健康检查: http://{}/health", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let server = axum::serve(listener, app);

    tokio::select! {
        result = server => {
            if let Err(e) = result {
                tracing::error!("服务器错误: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("收到 Ctrl+C，开始关闭...");
        }
    }

    info!("应用已退出");
    Ok(())
}
