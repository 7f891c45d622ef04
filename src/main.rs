fn main() {
    if let Err(err) = grid_managed::run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
