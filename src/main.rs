use callwatch::{init_tracing, CallRecorder, Settings};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let settings = Settings::load();
    tracing::info!(
        target_app = %settings.target_app,
        recordings_dir = %settings.recordings_dir().display(),
        "Loaded settings"
    );

    let recorder = CallRecorder::new(settings)?;
    recorder.start_monitoring();

    // Surface lifecycle events in the log until interrupted
    let mut events = recorder.subscribe_events();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = events.recv() => {
                if let Ok(event) = event {
                    tracing::debug!(?event, "Recorder event");
                }
            }
        }
    }

    recorder.shutdown().await;
    Ok(())
}
