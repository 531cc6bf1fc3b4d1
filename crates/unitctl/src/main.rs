// SPDX-License-Identifier: MPL-2.0

mod cli;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    match cli::process() {
        Ok(exit_ok) => {
            if !exit_ok {
                std::process::exit(1);
            }
        }
        Err(error) => {
            eprintln!("unitctl: {error}");
            std::process::exit(1);
        }
    }
}
