use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    nobelforge::cli::main()
}
