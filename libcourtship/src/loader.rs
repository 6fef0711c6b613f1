use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;

use super::error::LoaderError;
use super::worker_status::WorkerStatus;

/// List the files in dir whose names end with suffix, sorted by name
pub fn list_files(dir: &Path, suffix: &str) -> Result<Vec<PathBuf>, LoaderError> {
    if !dir.is_dir() {
        return Err(LoaderError::MissingInput(format!(
            "directory {} does not exist",
            dir.to_string_lossy()
        )));
    }
    let mut files: Vec<PathBuf> = Vec::new();
    for item in dir.read_dir()? {
        let item_path = item?.path();
        let matches = item_path
            .file_name()
            .map(|n| n.to_string_lossy().ends_with(suffix))
            .unwrap_or(false);
        if matches && item_path.is_file() {
            files.push(item_path);
        }
    }
    files.sort();
    Ok(files)
}

/// Total size of a set of files in bytes. Files that cannot be inspected count as empty.
pub fn total_data_size<P: AsRef<Path>>(paths: &[P]) -> u64 {
    paths
        .iter()
        .filter_map(|p| p.as_ref().metadata().ok())
        .map(|m| m.len())
        .sum()
}

/// Divide a set of jobs in to a set of subsets (per thread/worker), round-robin
pub fn create_subsets(n_jobs: usize, n_threads: usize) -> Vec<Vec<usize>> {
    let mut subsets: Vec<Vec<usize>> = vec![Vec::new(); n_threads.max(1)];
    let n_subsets = subsets.len();

    for job in 0..n_jobs {
        subsets[job % n_subsets].push(job)
    }

    subsets
}

/// Load every job on a pool of at most n_threads worker threads.
///
/// Jobs are independent; results are returned in job order. Each worker reports its progress
/// through tx after every file. The first failed load fails the whole call.
pub fn load_parallel<J, T, F>(
    jobs: &[J],
    n_threads: usize,
    tx: &Sender<WorkerStatus>,
    load: F,
) -> Result<Vec<T>, LoaderError>
where
    J: AsRef<Path> + Sync,
    T: Send,
    F: Fn(&J) -> Result<T, LoaderError> + Sync,
{
    log::info!(
        "Loading {} files ({}) on {} workers",
        jobs.len(),
        human_bytes::human_bytes(total_data_size(jobs) as f64),
        n_threads.max(1).min(jobs.len().max(1))
    );
    let subsets = create_subsets(jobs.len(), n_threads);
    let load = &load;

    let mut loaded = std::thread::scope(|scope| -> Result<Vec<(usize, T)>, LoaderError> {
        let mut handles = Vec::new();
        for (worker_id, subset) in subsets.into_iter().enumerate() {
            // Dont make empty workers
            if subset.is_empty() {
                continue;
            }
            let tx = tx.clone();
            handles.push(scope.spawn(move || -> Result<Vec<(usize, T)>, LoaderError> {
                let n_jobs = subset.len();
                let mut results = Vec::with_capacity(n_jobs);
                for (done, idx) in subset.into_iter().enumerate() {
                    let job = &jobs[idx];
                    results.push((idx, load(job)?));
                    tx.send(WorkerStatus::new(
                        (done + 1) as f32 / n_jobs as f32,
                        worker_id,
                        n_jobs,
                        &job.as_ref().to_string_lossy(),
                    ))?;
                }
                Ok(results)
            }));
        }

        let mut loaded = Vec::with_capacity(jobs.len());
        for handle in handles {
            match handle.join() {
                Ok(results) => loaded.extend(results?),
                Err(_) => return Err(LoaderError::WorkerPanicked),
            }
        }
        Ok(loaded)
    })?;

    loaded.sort_by_key(|(idx, _)| *idx);
    Ok(loaded.into_iter().map(|(_, t)| t).collect())
}
