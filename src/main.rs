fn main() {
    if let Err(err) = dorado_lib::run() {
        eprintln!("dorado: {err:#}");
        std::process::exit(1);
    }
}
