//! Fallible stable merge sort.
//!
//! The standard library sorts take an infallible comparator and may panic if
//! the ordering is not total. The duplicate comparator can fail (a file that
//! vanished cannot be hashed), and with distinct hard links its relation is
//! not transitive across inode groups. [`try_sort_by`] accepts both: the
//! first comparator error stops the sort and is returned, and an inconsistent
//! ordering yields some permutation rather than a panic.

use std::cmp::Ordering;

/// Slices at or below this length are sorted by insertion.
const INSERTION_THRESHOLD: usize = 16;

/// Sort `v` stably with a comparator that may fail.
///
/// On error the slice is still a permutation of its input, in unspecified
/// order.
///
/// # Errors
///
/// Returns the first error produced by `compare`.
pub fn try_sort_by<T, E, F>(v: &mut [T], mut compare: F) -> Result<(), E>
where
    T: Copy,
    F: FnMut(&T, &T) -> Result<Ordering, E>,
{
    if v.len() <= INSERTION_THRESHOLD {
        return insertion_sort(v, &mut compare);
    }

    let mut scratch = v.to_vec();
    merge_sort(v, &mut scratch, &mut compare)
}

fn insertion_sort<T, E, F>(v: &mut [T], compare: &mut F) -> Result<(), E>
where
    T: Copy,
    F: FnMut(&T, &T) -> Result<Ordering, E>,
{
    for i in 1..v.len() {
        let mut j = i;
        while j > 0 && compare(&v[j - 1], &v[j])? == Ordering::Greater {
            v.swap(j - 1, j);
            j -= 1;
        }
    }
    Ok(())
}

fn merge_sort<T, E, F>(v: &mut [T], scratch: &mut [T], compare: &mut F) -> Result<(), E>
where
    T: Copy,
    F: FnMut(&T, &T) -> Result<Ordering, E>,
{
    let len = v.len();
    if len <= INSERTION_THRESHOLD {
        return insertion_sort(v, compare);
    }

    let mid = len / 2;
    {
        let (left, right) = v.split_at_mut(mid);
        let (scratch_left, scratch_right) = scratch.split_at_mut(mid);
        merge_sort(left, scratch_left, compare)?;
        merge_sort(right, scratch_right, compare)?;
    }

    // Halves already in order: nothing to merge.
    if compare(&v[mid - 1], &v[mid])? != Ordering::Greater {
        return Ok(());
    }

    // Merge into scratch so `v` stays intact if the comparator fails.
    let (left, right) = v.split_at(mid);
    let out = &mut scratch[..len];
    let (mut i, mut j, mut k) = (0, 0, 0);
    while i < left.len() && j < right.len() {
        if compare(&right[j], &left[i])? == Ordering::Less {
            out[k] = right[j];
            j += 1;
        } else {
            out[k] = left[i];
            i += 1;
        }
        k += 1;
    }
    let rest_left = left.len() - i;
    out[k..k + rest_left].copy_from_slice(&left[i..]);
    out[k + rest_left..].copy_from_slice(&right[j..]);

    v.copy_from_slice(out);
    Ok(())
}
