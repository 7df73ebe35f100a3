use actix_web::{middleware::Logger, App, HttpServer};
use log::{info, warn};
use movie_explorer::api::{self, AuthSettings};
use movie_explorer::{catalog, config};

fn startup_error<E: std::fmt::Display>(err: E) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::Other, err.to_string())
}

#[actix_rt::main]
async fn main() -> std::io::Result<()> {
    if std::env::var_os("RUST_LOG").is_none() {
        std::env::set_var("RUST_LOG", config::DEFAULT_LOG);
    }
    env_logger::init();

    let config = config::Config::from_env().map_err(startup_error)?;
    if config.ephemeral_key {
        warn!("MOVIES_SECRET_KEY is not set, sessions will not survive a restart");
    }
    let db = config.open_db().map_err(startup_error)?;
    let count = catalog::seed(&db, config.catalog_path.as_deref()).map_err(startup_error)?;
    info!("catalog holds {} movies", count);

    let settings = AuthSettings {
        bcrypt_cost: config.bcrypt_cost,
    };
    let key = config.secret_key.clone();
    let secure = config.secure_cookie;
    info!("listening on {}", config.bind);
    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(api::identity_service(&key, secure))
            .data(db.clone())
            .data(settings.clone())
            .configure(api::configure)
    })
    .bind(&config.bind)?
    .run()
    .await
}
