// src/record/merge.rs

use std::collections::HashSet;

use super::FieldValue;

/// What to do with a value arriving for a key that is already filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Merge {
    Keep,
    Replace,
    /// Both sides carry differing data; store the newcomer under a suffixed key.
    Conflict,
}

/// Missing loses to anything; zero loses to non-zero; equal values collapse.
pub fn merge_values(existing: &FieldValue, new: &FieldValue) -> Merge {
    use FieldValue::*;
    match (existing, new) {
        (_, Missing) => Merge::Keep,
        (Missing, _) => Merge::Replace,
        (Number(a), Number(b)) if a == b => Merge::Keep,
        (Number(a), _) if *a == 0.0 => Merge::Replace,
        (_, Number(b)) if *b == 0.0 => Merge::Keep,
        (Text(a), Text(b)) if a == b => Merge::Keep,
        _ => Merge::Conflict,
    }
}

/// Order the columns of one duplicate group: more non-missing values first,
/// then more distinct numbers, then source order.
pub fn rank_columns(values: &[Vec<FieldValue>], cols: &[usize]) -> Vec<usize> {
    let mut ranked: Vec<(usize, usize, usize)> = cols
        .iter()
        .map(|&c| {
            let present = values.iter().filter(|row| !row[c].is_missing()).count();
            let distinct = values
                .iter()
                .filter_map(|row| row[c].as_number())
                .map(f64::to_bits)
                .collect::<HashSet<_>>()
                .len();
            (c, present, distinct)
        })
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(b.2.cmp(&a.2)).then(a.0.cmp(&b.0)));
    ranked.into_iter().map(|(c, _, _)| c).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use FieldValue::*;

    #[test]
    fn merge_rules() {
        assert_eq!(merge_values(&Missing, &Number(5.0)), Merge::Replace);
        assert_eq!(merge_values(&Number(5.0), &Missing), Merge::Keep);
        assert_eq!(merge_values(&Number(0.0), &Number(5.0)), Merge::Replace);
        assert_eq!(merge_values(&Number(5.0), &Number(0.0)), Merge::Keep);
        assert_eq!(merge_values(&Number(5.0), &Number(5.0)), Merge::Keep);
        assert_eq!(merge_values(&Number(5.0), &Number(6.0)), Merge::Conflict);
        assert_eq!(merge_values(&Text("a".into()), &Text("a".into())), Merge::Keep);
        assert_eq!(merge_values(&Text("a".into()), &Number(1.0)), Merge::Conflict);
    }

    #[test]
    fn fuller_column_ranks_first() {
        let values = vec![
            vec![Missing, Number(1.0), Number(1.0)],
            vec![Number(2.0), Number(2.0), Number(2.0)],
            vec![Missing, Number(3.0), Number(2.0)],
        ];
        // column 1 and 2 both have 3 values; column 1 has 3 distinct numbers
        assert_eq!(rank_columns(&values, &[0, 1, 2]), vec![1, 2, 0]);

        // full tie keeps source order
        let tied = vec![vec![Number(50000.0), Number(55000.0)]];
        assert_eq!(rank_columns(&tied, &[1, 0]), vec![0, 1]);
    }
}
