fn main() -> Result<(), Box<dyn std::error::Error>> {
    moldserve_cli::run()
}
