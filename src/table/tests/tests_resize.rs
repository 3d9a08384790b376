#[cfg(test)]
mod tests {
    use crate::table::{Key16, KeyBlock, Shard, next_prime};

    /// Distinct 16-byte-class name for index `i`.
    fn name(i: usize) -> Vec<u8> {
        format!("st-{i:08}").into_bytes()
    }

    #[test]
    fn next_prime_matches_documented_capacities() {
        assert_eq!(next_prime(6000), 6007);
        assert_eq!(next_prime(2000), 2003);
        assert_eq!(next_prime(2), 2);
        assert_eq!(next_prime(13), 13);
        assert_eq!(next_prime(14), 17);
    }

    #[test]
    fn growth_preserves_every_entry() {
        // Tiny seed so a handful of inserts forces several rehashes.
        let mut shard = Shard::<Key16>::with_seed_capacity(2);

        for i in 0..500 {
            let key = Key16::from_name(&name(i));
            let acc = shard.lookup_or_insert(key);
            acc.record(i as i32 % 1000 - 500);
        }
        assert_eq!(shard.len(), 500);

        // Every key still resolves to its own accumulator after growth.
        for i in 0..500 {
            let key = Key16::from_name(&name(i));
            let acc = shard.lookup_or_insert(key);
            assert_eq!(acc.count, 1, "entry {i} lost by a rehash");
            assert_eq!(acc.sum, (i as i32 % 1000 - 500) as i64);
        }
        assert_eq!(shard.len(), 500, "re-lookup must not insert");
    }

    #[test]
    fn growth_keeps_insertion_order_iteration() {
        let mut shard = Shard::<Key16>::with_seed_capacity(2);
        for i in 0..50 {
            shard.lookup_or_insert(Key16::from_name(&name(i))).record(1);
        }

        let names: Vec<Vec<u8>> = shard.iter().map(|(n, _)| n.to_vec()).collect();
        let expected: Vec<Vec<u8>> = (0..50).map(name).collect();
        assert_eq!(names, expected);
    }

    #[test]
    fn seed_capacity_rounds_up_to_a_prime() {
        let mut shard = Shard::<Key16>::with_seed_capacity(10);
        // Fill past the seed; growth must kick in without losing entries.
        for i in 0..11 {
            shard.lookup_or_insert(Key16::from_name(&name(i))).record(0);
        }
        assert_eq!(shard.len(), 11);
    }
}
