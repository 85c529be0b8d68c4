fn main() {
    if let Err(err) = datautils::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
