// Entrypoint for the CLI application.
// - Keeps `main` small: parse the flags, fill in the password, run the
//   pipeline and report where the result landed.
// - Returns `anyhow::Result` so a failing step exits non-zero with the
//   full error chain.

use clap::Parser;
use dentcad_cli::args::Cli;
use dentcad_cli::workflow;
use dialoguer::Password;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // `Password` hides the input; prompting keeps the secret off the shell
    // history when the flag is omitted.
    let password = match cli.password.clone() {
        Some(password) => password,
        None => Password::new().with_prompt("Password").interact()?,
    };

    let config = cli.into_run_config(password)?;
    let out_path = workflow::run(&config)?;
    println!("Saved design to {}", out_path.display());
    Ok(())
}
