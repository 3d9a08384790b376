#[cfg(test)]
mod tests {
    use crate::partition::worker_count;

    const GIB: u64 = 1 << 30;

    #[test]
    fn small_machines_reserve_two_cores() {
        assert_eq!(worker_count(13 * GIB / 8, 8), 6);
        assert_eq!(worker_count(1024, 4), 2);
        assert_eq!(worker_count(1024, 15), 13);
    }

    #[test]
    fn big_machines_reserve_one_core() {
        assert_eq!(worker_count(1024, 16), 15);
        assert_eq!(worker_count(1024, 32), 31);
    }

    #[test]
    fn huge_files_get_a_worker_per_two_gib() {
        // 13 GiB on a small box: the size floor wins over the core policy.
        assert_eq!(worker_count(13 * GIB, 4), 7);
        // Exactly 2 GiB is one span; one byte more needs a second worker.
        assert_eq!(worker_count(2 * GIB, 4), 2);
        assert_eq!(worker_count(2 * GIB + 1, 32), 31);
    }

    #[test]
    fn at_least_one_worker() {
        assert_eq!(worker_count(0, 1), 1);
        assert_eq!(worker_count(10, 2), 1);
    }
}
