use std::process::ExitCode;

use readyio::{config::DemoConfig, fizzbuzz};

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let config = DemoConfig::from_env();
    log::debug!("running with {:?}", config);

    match fizzbuzz::run(&config, |line| println!("{}", line)) {
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{}", err);
            let code = err.raw_os_error().unwrap_or(1).clamp(1, 255);
            ExitCode::from(code as u8)
        }
    }
}
