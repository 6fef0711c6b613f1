/// Progress message sent by a loader worker after each file it finishes.
#[derive(Debug, Clone, Default)]
pub struct WorkerStatus {
    pub progress: f32,
    pub worker_id: usize,
    pub n_jobs: usize,
    pub last_file: String,
}

impl WorkerStatus {
    pub fn new(progress: f32, worker_id: usize, n_jobs: usize, last_file: &str) -> Self {
        Self {
            progress,
            worker_id,
            n_jobs,
            last_file: last_file.to_string(),
        }
    }
}
