use crate::auth::password::hash_password;
use crate::config::AppConfig;

pub fn hash(config: &AppConfig, password: &str) -> anyhow::Result<()> {
    let hash = hash_password(password, config.security.bcrypt_cost)?;
    println!("{}", hash);
    Ok(())
}
