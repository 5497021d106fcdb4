use std::error::Error;

#[rocket::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let rocket = auth_server::rocket()?;
    log::info!("starting auth server");
    rocket.launch().await?;
    Ok(())
}
