fn main() -> miette::Result<()> {
    lodebar::start_lodebar()
}
