use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use dotenvy::dotenv;
use tracing::{info, warn};

use commentsback::{
    api::{self, AppState},
    authz::AuthorizationResolver,
    config::AppConfig,
    db,
    gate::SubmissionGate,
    mem::{MemCommentStore, MemRateLimitStore},
    ratelimit::RateLimitTracker,
    store::{CommentStore, RateLimitRecordStore},
    telemetry,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env if present
    dotenv().ok();
    telemetry::init_tracing();

    let cfg = AppConfig::from_env();

    let (comments, limits): (Arc<dyn CommentStore>, Arc<dyn RateLimitRecordStore>) =
        match &cfg.database_url {
            Some(url) => {
                let pool = db::connect(url).await?;
                db::init(&pool).await?;
                (
                    Arc::new(db::PgCommentStore::new(pool.clone())),
                    Arc::new(db::PgRateLimitStore::new(pool)),
                )
            }
            None => {
                warn!("DATABASE_URL not set, falling back to in-memory stores");
                (
                    Arc::new(MemCommentStore::new()),
                    Arc::new(MemRateLimitStore::new()),
                )
            }
        };

    let tracker = RateLimitTracker::new(limits, cfg.daily_comment_limit);
    let state = AppState {
        gate: SubmissionGate::new(comments.clone(), tracker),
        resolver: AuthorizationResolver::new(comments),
        cfg: cfg.clone(),
    };
    let app = api::router(state);

    let addr: SocketAddr = format!("{}:{}", cfg.host, cfg.port).parse()?;
    info!(%addr, "starting comment gate server");
    axum::serve(tokio::net::TcpListener::bind(addr).await?, app).await?;

    Ok(())
}
