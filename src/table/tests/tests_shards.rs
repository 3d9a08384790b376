#[cfg(test)]
mod tests {
    use crate::table::{Key16, Key32, Key128, KeyBlock, StationTable};

    #[test]
    fn name_lengths_route_to_the_documented_widths() {
        let mut table = StationTable::new();

        table.accumulate_narrow(Key16::from_name(&[b'a'; 16]), 1);
        table.accumulate_mid(Key32::from_name(&[b'b'; 17]), 2);
        table.accumulate_mid(Key32::from_name(&[b'c'; 32]), 3);
        table.accumulate_wide(Key128::from_name(&[b'd'; 33]), 4);
        table.accumulate_wide(Key128::from_name(&[b'e'; 100]), 5);

        let stats = table.stats();
        assert_eq!(stats.narrow_entries, 1);
        assert_eq!(stats.mid_entries, 2);
        assert_eq!(stats.wide_entries, 2);
    }

    #[test]
    fn padding_is_key_material() {
        // Same prefix, different lengths — distinct keys within a shard.
        let mut table = StationTable::new();
        table.accumulate_narrow(Key16::from_name(b"Java"), 1);
        table.accumulate_narrow(Key16::from_name(b"Jav"), 2);

        assert_eq!(table.station_count(), 2);
    }

    #[test]
    fn identical_names_build_identical_keys() {
        let a = Key32::from_name(b"Washington-on-the-Brazos!");
        let b = Key32::from_name(b"Washington-on-the-Brazos!");
        assert_eq!(a, b);
        assert_eq!(a.hash(), b.hash());
    }

    #[test]
    fn hash_folds_only_the_first_sixteen_bytes() {
        // Shared 16-byte prefix ⇒ same hash, same chain; full-width equality
        // still tells the keys apart.
        let x = Key32::from_name(b"AaaaaaaaaaaaaaaaX");
        let y = Key32::from_name(b"AaaaaaaaaaaaaaaaY");
        assert_eq!(x.hash(), y.hash());
        assert_ne!(x, y);

        let mut table = StationTable::new();
        table.accumulate_mid(x, 10);
        table.accumulate_mid(y, 20);
        assert_eq!(table.station_count(), 2, "colliding names must not merge");

        // First match in the chain wins; both accumulators stay separate.
        table.accumulate_mid(x, 30);
        let by_name: Vec<(Vec<u8>, u64)> = table
            .iter()
            .map(|(name, acc)| (name.to_vec(), acc.count))
            .collect();
        assert!(by_name.contains(&(b"AaaaaaaaaaaaaaaaX".to_vec(), 2)));
        assert!(by_name.contains(&(b"AaaaaaaaaaaaaaaaY".to_vec(), 1)));
    }

    #[test]
    fn utf8_names_round_trip_through_key_blocks() {
        // 100 bytes of multibyte UTF-8 (50 × 2-byte 'Ж').
        let name = "Ж".repeat(50);
        assert_eq!(name.len(), 100);

        let key = Key128::from_name(name.as_bytes());
        assert_eq!(key.name(), name.as_bytes());
    }

    #[test]
    fn wide_keys_zero_their_tail() {
        let key = Key128::from_name(&[b'z'; 33]);
        assert_eq!(&key.as_bytes()[..33], &[b'z'; 33][..]);
        assert!(key.as_bytes()[33..].iter().all(|&b| b == 0));
    }
}
