//! Group Scheduler (C5): partitions entities by numeric filename prefix and
//! runs a per-entity action across each group — concurrently within a
//! group, sequentially across groups. Grounded in the same
//! spawn-then-join-and-collect shape used for concurrent per-item execution
//! elsewhere in this crate's lineage.

use std::future::Future;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Key {
    Numeric(u64),
    Singleton(usize),
}

/// Parse the leading `NN-` numeric prefix of a filename, if present.
fn group_key_of(filename: &str) -> Option<u64> {
    let dash = filename.find('-')?;
    let digits = &filename[..dash];
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Partition a sorted filename list into contiguous runs sharing the same
/// numeric group key. Filenames without a numeric prefix each form their own
/// singleton run, even if adjacent.
fn partition(filenames: &[String]) -> Vec<Vec<usize>> {
    let keys: Vec<Key> = filenames
        .iter()
        .enumerate()
        .map(|(i, name)| match group_key_of(name) {
            Some(k) => Key::Numeric(k),
            None => Key::Singleton(i),
        })
        .collect();

    let mut runs = Vec::new();
    let mut current: Vec<usize> = Vec::new();
    let mut current_key: Option<Key> = None;

    for (i, key) in keys.into_iter().enumerate() {
        match current_key {
            Some(k) if k == key => current.push(i),
            _ => {
                if !current.is_empty() {
                    runs.push(std::mem::take(&mut current));
                }
                current.push(i);
                current_key = Some(key);
            }
        }
    }
    if !current.is_empty() {
        runs.push(current);
    }
    runs
}

/// Run `f(name)` over `filenames`, grouped and ordered per the module docs.
/// Results are returned in original (start) order, regardless of which
/// group-internal task finished first.
pub async fn run_grouped<F, Fut, T>(filenames: &[String], mut f: F) -> Vec<(String, T)>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    let mut results: Vec<Option<(String, T)>> = (0..filenames.len()).map(|_| None).collect();

    for run in partition(filenames) {
        if run.len() == 1 {
            let idx = run[0];
            let name = filenames[idx].clone();
            let out = f(name.clone()).await;
            results[idx] = Some((name, out));
        } else {
            let mut set = tokio::task::JoinSet::new();
            for idx in run {
                let name = filenames[idx].clone();
                let fut = f(name.clone());
                set.spawn(async move { (idx, name, fut.await) });
            }
            while let Some(joined) = set.join_next().await {
                match joined {
                    Ok((idx, name, out)) => results[idx] = Some((name, out)),
                    Err(e) => {
                        if e.is_panic() {
                            std::panic::resume_unwind(e.into_panic());
                        }
                    }
                }
            }
        }
    }

    results.into_iter().map(|r| r.expect("every index filled")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn names(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn group_key_parses_leading_digits_before_hyphen() {
        assert_eq!(group_key_of("01-a"), Some(1));
        assert_eq!(group_key_of("12-task.txt"), Some(12));
        assert_eq!(group_key_of("a.txt"), None);
        assert_eq!(group_key_of("-a"), None);
        assert_eq!(group_key_of("1a-b"), None);
    }

    #[test]
    fn partition_groups_contiguous_same_prefix_runs() {
        let fs = names(&["01-a", "01-b", "02-c", "z.txt"]);
        let runs = partition(&fs);
        assert_eq!(runs, vec![vec![0, 1], vec![2], vec![3]]);
    }

    #[test]
    fn partition_keeps_adjacent_ungrouped_files_separate() {
        let fs = names(&["a.txt", "b.txt"]);
        let runs = partition(&fs);
        assert_eq!(runs, vec![vec![0], vec![1]]);
    }

    #[tokio::test]
    async fn run_grouped_preserves_start_order_in_results() {
        let fs = names(&["01-a", "01-b", "02-c"]);
        let log = Arc::new(Mutex::new(Vec::new()));
        let results = run_grouped(&fs, {
            let log = log.clone();
            move |name| {
                let log = log.clone();
                async move {
                    log.lock().unwrap().push(name.clone());
                    name
                }
            }
        })
        .await;
        assert_eq!(
            results.into_iter().map(|(n, _)| n).collect::<Vec<_>>(),
            vec!["01-a".to_string(), "01-b".to_string(), "02-c".to_string()]
        );
    }

    #[tokio::test]
    async fn run_grouped_runs_same_prefix_entries_concurrently() {
        let fs = names(&["01-a", "01-b"]);
        let started = Arc::new(tokio::sync::Barrier::new(2));
        let results = run_grouped(&fs, {
            let started = started.clone();
            move |name| {
                let started = started.clone();
                async move {
                    started.wait().await;
                    name
                }
            }
        })
        .await;
        assert_eq!(results.len(), 2);
    }
}
