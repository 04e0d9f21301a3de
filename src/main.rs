fn main() -> anyhow::Result<()> {
    pcbscript::run()
}
