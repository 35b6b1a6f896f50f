use super::CandidateRow;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};

/// Thresholds applied to peak rows before triggering.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterThresholds {
    pub min_snr: f64,
    pub min_snr_wide: f64,
    pub wide_ibox: u32,
    pub max_ibox: u32,
    pub min_dm: f64,
    pub max_ctb0: usize,
    pub max_ctb: usize,
    pub max_ncl: usize,
}

fn by_snr_desc(a: &CandidateRow, b: &CandidateRow) -> Ordering {
    b.snr.partial_cmp(&a.snr).unwrap_or(Ordering::Equal)
}

/// Reduce every cluster to its highest-snr row, recording the cluster's size
/// (`cntc`) and number of distinct beams (`cntb`). Output is ordered by cluster id.
pub fn peak_rows(rows: &[CandidateRow]) -> Vec<CandidateRow> {
    let mut clusters: BTreeMap<usize, (usize, HashSet<u32>, usize)> = BTreeMap::new();

    for (idx, row) in rows.iter().enumerate() {
        let entry = clusters
            .entry(row.cl)
            .or_insert_with(|| (idx, HashSet::new(), 0));
        if row.snr > rows[entry.0].snr {
            entry.0 = idx;
        }
        entry.1.insert(row.ibeam);
        entry.2 += 1;
    }

    clusters
        .into_values()
        .map(|(peak, beams, members)| {
            let mut row = rows[peak].clone();
            row.cntc = members;
            row.cntb = beams.len();
            row
        })
        .collect()
}

/// Number of distinct beams among the peak rows.
pub fn beam_count(peaks: &[CandidateRow]) -> usize {
    peaks.iter().map(|r| r.ibeam).collect::<HashSet<_>>().len()
}

/// Fraction of the brightest cluster's members whose boxcar is at least
/// `wide_ibox`. A singleton cluster yields 0.0.
pub fn wide_fraction(rows: &[CandidateRow], wide_ibox: u32) -> f64 {
    let Some(brightest) = rows
        .iter()
        .fold(None::<&CandidateRow>, |best, row| match best {
            Some(b) if b.snr >= row.snr => Some(b),
            _ => Some(row),
        })
    else {
        return 0.0;
    };

    let members: Vec<&CandidateRow> = rows.iter().filter(|r| r.cl == brightest.cl).collect();
    if members.len() <= 1 {
        return 0.0;
    }

    let wide = members.iter().filter(|r| r.ibox >= wide_ibox).count();
    wide as f64 / members.len() as f64
}

/// True when the peaks look like an instrumental artifact: more than
/// `min_peaks` peak rows and at least `fraction` of them at `saturation_ibox`.
pub fn boxcar_saturated(
    peaks: &[CandidateRow],
    saturation_ibox: u32,
    fraction: f64,
    min_peaks: usize,
) -> bool {
    if peaks.len() <= min_peaks {
        return false;
    }
    let saturated = peaks.iter().filter(|r| r.ibox == saturation_ibox).count();
    saturated as f64 / peaks.len() as f64 >= fraction
}

/// Peak rows that pass every threshold, brightest first, at most `max_ncl`.
pub fn filter_clustered(peaks: &[CandidateRow], t: &FilterThresholds) -> Vec<CandidateRow> {
    let mut kept: Vec<CandidateRow> = peaks
        .iter()
        .filter(|r| r.snr > t.min_snr)
        .filter(|r| r.ibox < t.wide_ibox || r.snr > t.min_snr_wide)
        .filter(|r| r.dm > t.min_dm)
        .filter(|r| r.ibox < t.max_ibox)
        .filter(|r| r.cntb < t.max_ctb0)
        .filter(|r| r.cntc < t.max_ctb)
        .cloned()
        .collect();

    kept.sort_by(by_snr_desc);
    kept.truncate(t.max_ncl);
    kept
}

/// Peak rows worth recording: above `min_snr`, brightest `max_ncl` kept,
/// original order preserved.
pub fn select_for_output<T>(rows: &[(CandidateRow, T)], min_snr: f64, max_ncl: usize) -> Vec<&(CandidateRow, T)> {
    let mut ranked: Vec<usize> = (0..rows.len()).filter(|&i| rows[i].0.snr > min_snr).collect();

    // Stable, so equal snr keeps cluster order.
    ranked.sort_by(|&a, &b| by_snr_desc(&rows[a].0, &rows[b].0));
    ranked.truncate(max_ncl);
    ranked.sort_unstable();

    ranked.into_iter().map(|i| &rows[i]).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(snr: f64, ibox: u32, ibeam: u32, cl: usize) -> CandidateRow {
        let mut row = CandidateRow::new(snr, 0, ibox, 400.0, ibeam);
        row.cl = cl;
        row
    }

    fn thresholds() -> FilterThresholds {
        FilterThresholds {
            min_snr: 8.0,
            min_snr_wide: 10.0,
            wide_ibox: 16,
            max_ibox: 64,
            min_dm: 50.0,
            max_ctb0: 30,
            max_ctb: 100,
            max_ncl: 10,
        }
    }

    #[test]
    fn test_peak_rows_counts_members_and_beams() {
        let rows = vec![
            row(9.0, 4, 1, 0),
            row(12.0, 4, 2, 0),
            row(11.0, 8, 2, 0),
            row(7.0, 2, 5, 1),
        ];
        let peaks = peak_rows(&rows);
        assert_eq!(peaks.len(), 2);
        assert_eq!(peaks[0].snr, 12.0);
        assert_eq!(peaks[0].cntc, 3);
        assert_eq!(peaks[0].cntb, 2);
        assert_eq!(peaks[1].snr, 7.0);
        assert_eq!(peaks[1].cntc, 1);
        assert_eq!(beam_count(&peaks), 2);
    }

    #[test]
    fn test_wide_fraction_singleton_is_zero() {
        let rows = vec![row(20.0, 64, 1, 0), row(9.0, 64, 1, 1), row(8.0, 64, 1, 1)];
        assert_eq!(wide_fraction(&rows, 32), 0.0);
    }

    #[test]
    fn test_wide_fraction_of_brightest_cluster() {
        let rows = vec![
            row(20.0, 64, 1, 0),
            row(9.0, 32, 1, 0),
            row(8.0, 4, 1, 0),
            row(7.0, 2, 1, 0),
            row(30.0, 1, 1, 1),
            row(6.0, 1, 1, 1),
        ];
        // Brightest row is in cluster 1, where nothing is wide.
        assert_eq!(wide_fraction(&rows, 32), 0.0);

        let rows = &rows[..4];
        assert_eq!(wide_fraction(rows, 32), 0.5);
        assert_eq!(wide_fraction(&[], 32), 0.0);
    }

    #[test]
    fn test_boxcar_saturation() {
        let mut peaks: Vec<CandidateRow> = (0..17).map(|i| row(10.0, 64, i, i as usize)).collect();
        peaks.push(row(10.0, 4, 99, 99));
        peaks.push(row(10.0, 4, 98, 98));
        peaks.push(row(10.0, 4, 97, 97));
        // 17 of 20 = 0.85
        assert!(boxcar_saturated(&peaks, 64, 0.85, 15));

        peaks.push(row(10.0, 4, 96, 96));
        // 17 of 21 < 0.85
        assert!(!boxcar_saturated(&peaks, 64, 0.85, 15));

        let few: Vec<CandidateRow> = (0..15).map(|i| row(10.0, 64, i, i as usize)).collect();
        assert!(!boxcar_saturated(&few, 64, 0.85, 15));
    }

    #[test]
    fn test_filter_clustered_thresholds() {
        let mut low_dm = row(20.0, 4, 1, 2);
        low_dm.dm = 30.0;
        let peaks = vec![
            row(9.0, 4, 1, 0),   // kept
            row(9.0, 32, 1, 1),  // wide and below min_snr_wide
            low_dm,              // below dm floor
            row(7.0, 4, 1, 3),   // below min_snr
            row(15.0, 64, 1, 4), // at max_ibox
            row(12.0, 16, 1, 5), // wide and bright enough
        ];
        let kept = filter_clustered(&peaks, &thresholds());
        let snrs: Vec<f64> = kept.iter().map(|r| r.snr).collect();
        assert_eq!(snrs, vec![12.0, 9.0]);
    }

    #[test]
    fn test_filter_clustered_caps_clusters() {
        let peaks: Vec<CandidateRow> = (0..5).map(|i| row(9.0 + i as f64, 4, 1, i)).collect();
        let mut t = thresholds();
        t.max_ncl = 2;
        let kept = filter_clustered(&peaks, &t);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].snr, 13.0);
        assert_eq!(kept[1].snr, 12.0);
    }

    #[test]
    fn test_select_for_output() {
        let rows: Vec<(CandidateRow, u8)> = vec![
            (row(5.0, 4, 1, 0), 0),
            (row(9.0, 4, 1, 1), 0),
            (row(12.0, 4, 1, 2), 1),
            (row(10.0, 4, 1, 3), 0),
        ];
        let selected = select_for_output(&rows, 6.0, 2);
        let snrs: Vec<f64> = selected.iter().map(|(r, _)| r.snr).collect();
        assert_eq!(snrs, vec![12.0, 10.0]);
    }

    #[test]
    fn test_select_for_output_ties_keep_brightest() {
        let rows: Vec<(CandidateRow, u8)> = vec![
            (row(10.0, 4, 1, 0), 0),
            (row(10.0, 4, 1, 1), 0),
            (row(12.0, 4, 1, 2), 1),
        ];
        let selected = select_for_output(&rows, 6.0, 2);
        let clusters: Vec<usize> = selected.iter().map(|(r, _)| r.cl).collect();
        assert_eq!(clusters, vec![0, 2]);
        assert!(select_for_output(&rows, 6.0, 0).is_empty());
    }
}
