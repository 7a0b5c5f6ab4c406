fn main() -> anyhow::Result<()> {
    pulse_monitor::cli::main()
}
