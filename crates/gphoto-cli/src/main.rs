mod cli;

fn main() {
    if let Err(e) = cli::run() {
        let core_error = e
            .chain()
            .find_map(|cause| cause.downcast_ref::<gphoto_core::Error>());
        if core_error.is_some_and(gphoto_core::Error::is_cancelled) {
            eprintln!("Interrupted.");
            std::process::exit(130);
        }

        eprintln!("{e:#}"); // pretty anyhow chain
        if let Some(hint) = core_error.and_then(gphoto_core::Error::hint) {
            eprintln!("{hint}");
        }
        std::process::exit(1);
    }
}
