fn main() {
    if let Err(err) = pagewise_lib::run() {
        tracing::error!(error = %err, "pagewise exited with an error");
        eprintln!("pagewise: {}", err);
        std::process::exit(1);
    }
}
