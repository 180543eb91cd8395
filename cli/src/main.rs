fn main() -> anyhow::Result<()> {
    sparqlc_cli::run()
}
