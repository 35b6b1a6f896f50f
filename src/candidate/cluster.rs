use super::{CandidateRow, ProcessingError};
use crate::config::types::ClusteringConfig;

/// Groups candidates that belong to the same event, writing the group into
/// `CandidateRow::cl`. Everything may end up in a single cluster.
pub trait Clusterer: Send + Sync {
    fn cluster(&self, rows: &mut [CandidateRow]) -> Result<(), ProcessingError>;
}

/// Single-linkage clustering: two candidates are linked when their distance in
/// (itime, idm, ibox, ibeam), each axis scaled by its linking length, is at
/// most 1. Cluster ids are assigned in order of first appearance.
#[derive(Debug, Clone)]
pub struct FriendsOfFriends {
    link_itime: f64,
    link_idm: f64,
    link_ibox: f64,
    link_ibeam: f64,
}

impl FriendsOfFriends {
    pub fn new(config: &ClusteringConfig) -> Self {
        Self {
            link_itime: config.link_itime,
            link_idm: config.link_idm,
            link_ibox: config.link_ibox,
            link_ibeam: config.link_ibeam,
        }
    }

    fn linked(&self, a: &CandidateRow, b: &CandidateRow) -> bool {
        let d = scaled(a.itime as f64 - b.itime as f64, self.link_itime)
            + scaled(f64::from(a.idm) - f64::from(b.idm), self.link_idm)
            + scaled(f64::from(a.ibox) - f64::from(b.ibox), self.link_ibox)
            + scaled(f64::from(a.ibeam) - f64::from(b.ibeam), self.link_ibeam);
        d <= 1.0
    }
}

fn scaled(delta: f64, link: f64) -> f64 {
    if link <= 0.0 {
        return if delta == 0.0 { 0.0 } else { f64::INFINITY };
    }
    let x = delta / link;
    x * x
}

impl Clusterer for FriendsOfFriends {
    fn cluster(&self, rows: &mut [CandidateRow]) -> Result<(), ProcessingError> {
        let n = rows.len();
        let mut parent: Vec<usize> = (0..n).collect();

        // Sweep in time order; pairs further apart in itime than the linking
        // length can never be linked.
        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by_key(|&i| rows[i].itime);

        for (pos, &i) in order.iter().enumerate() {
            for &j in &order[pos + 1..] {
                let gap = rows[j].itime.checked_sub(rows[i].itime).ok_or_else(|| {
                    ProcessingError::Overflow {
                        column: "if",
                        value: rows[j].itime.to_string(),
                    }
                })?;
                if gap as f64 > self.link_itime {
                    break;
                }
                if self.linked(&rows[i], &rows[j]) {
                    union(&mut parent, i, j);
                }
            }
        }

        let mut labels: Vec<Option<usize>> = vec![None; n];
        let mut next = 0;
        for i in 0..n {
            let root = find(&mut parent, i);
            let label = *labels[root].get_or_insert_with(|| {
                next += 1;
                next - 1
            });
            rows[i].cl = label;
        }

        Ok(())
    }
}

fn find(parent: &mut [usize], mut i: usize) -> usize {
    while parent[i] != i {
        parent[i] = parent[parent[i]];
        i = parent[i];
    }
    i
}

fn union(parent: &mut [usize], a: usize, b: usize) {
    let ra = find(parent, a);
    let rb = find(parent, b);
    if ra != rb {
        parent[ra.max(rb)] = ra.min(rb);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clusterer() -> FriendsOfFriends {
        FriendsOfFriends::new(&ClusteringConfig::default())
    }

    fn row(itime: i64, idm: u32, ibeam: u32) -> CandidateRow {
        let mut row = CandidateRow::new(10.0, itime, 4, 300.0, ibeam);
        row.idm = idm;
        row
    }

    #[test]
    fn test_separate_events() {
        let mut rows = vec![row(1000, 400, 10), row(1010, 402, 11), row(90000, 100, 200)];
        clusterer().cluster(&mut rows).unwrap();
        assert_eq!(rows[0].cl, 0);
        assert_eq!(rows[1].cl, 0);
        assert_eq!(rows[2].cl, 1);
    }

    #[test]
    fn test_chain_links_transitively() {
        let mut rows = vec![row(0, 0, 0), row(200, 0, 0), row(400, 0, 0)];
        clusterer().cluster(&mut rows).unwrap();
        assert!(rows.iter().all(|r| r.cl == 0));
    }

    #[test]
    fn test_single_row_is_one_cluster() {
        let mut rows = vec![row(5, 5, 5)];
        clusterer().cluster(&mut rows).unwrap();
        assert_eq!(rows[0].cl, 0);
    }

    #[test]
    fn test_empty_input() {
        let mut rows: Vec<CandidateRow> = Vec::new();
        clusterer().cluster(&mut rows).unwrap();
    }
}
