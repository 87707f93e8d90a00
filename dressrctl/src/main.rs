use clap::Parser;

fn main() {
    let cli = dressrctl::Cli::parse();
    if let Err(err) = dressrctl::run(cli) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
