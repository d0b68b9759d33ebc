fn main() {
    if let Err(err) = barcodegen_lib::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
