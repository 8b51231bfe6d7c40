use anyhow::Context;

use fyp_portal::config::Cfg;
use fyp_portal::session::Sessions;
use fyp_portal::store::Portal;
use fyp_portal::{io, router, AppState};

async fn restore_or_seed(cfg: &Cfg) -> anyhow::Result<Portal> {
    if let Some(portal) = io::load_snapshot(&cfg.data_file).await? {
        return Ok(portal);
    }

    let portal = if cfg.seed_demo_data {
        log::info!("No snapshot at {}; seeding demo data.", cfg.data_file.display());
        Portal::seeded(&cfg.default_admin_username, &cfg.default_admin_password)?
    } else {
        log::info!("No snapshot at {}; starting empty.", cfg.data_file.display());
        Portal::new(&cfg.default_admin_username, &cfg.default_admin_password)?
    };
    io::save_snapshot(&cfg.data_file, &portal).await?;
    Ok(portal)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let cfg = Cfg::load().map_err(anyhow::Error::msg)?;
    log::debug!("Configuration: {:?}", &cfg.addr);

    let portal = restore_or_seed(&cfg)
        .await
        .with_context(|| format!("loading portal state from {}", cfg.data_file.display()))?;
    let state = AppState::new(
        portal,
        Sessions::new(cfg.session_ttl),
        Some(cfg.data_file.clone()),
    );
    let app = router(state);

    log::info!("Starting FYP Portal HTTP Server on http://{}", cfg.addr);
    axum::Server::bind(&cfg.addr)
        .serve(app.into_make_service())
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                log::error!("Unable to listen for shutdown signal: {}", &e);
            }
            log::info!("Shutting down.");
        })
        .await?;
    Ok(())
}
