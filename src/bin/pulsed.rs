fn main() -> anyhow::Result<()> {
    pulsed::cli::main()
}
