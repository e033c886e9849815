mod cli;
mod config;
mod exec_args;

fn main() -> anyhow::Result<()> {
    cli::main()
}
