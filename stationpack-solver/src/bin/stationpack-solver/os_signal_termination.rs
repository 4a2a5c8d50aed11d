use stationpack_solver::termination::CancellationFlag;

/// Create a [`CancellationFlag`] which is raised by SIGINT or SIGTERM.
pub(crate) fn install() -> std::io::Result<CancellationFlag> {
    // The signals to listen to for termination.
    const TERMINATION_SIGNALS: &[std::ffi::c_int] =
        &[signal_hook::consts::SIGINT, signal_hook::consts::SIGTERM];

    let cancellation = CancellationFlag::new();

    for &signal in TERMINATION_SIGNALS {
        let _ = signal_hook::flag::register(signal, cancellation.flag())?;
    }

    Ok(cancellation)
}
