//! Partition indexers

use tsbench_interfaces::{PartitionKey, PointIndexer};

const FNV32_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV32_PRIME: u32 = 0x0100_0193;

/// 32-bit FNV-1 hash (multiply, then xor)
pub fn fnv1_32(bytes: &[u8]) -> u32 {
    bytes
        .iter()
        .fold(FNV32_OFFSET_BASIS, |hash, byte| hash.wrapping_mul(FNV32_PRIME) ^ u32::from(*byte))
}

/// Sends every point to partition 0
#[derive(Debug, Clone, Copy, Default)]
pub struct ConstantIndexer;

impl<P> PointIndexer<P> for ConstantIndexer {
    fn get_index(&self, _point: &P) -> usize {
        0
    }
}

/// Partitions points by the FNV-1 hash of their partition key
#[derive(Debug, Clone, Copy)]
pub struct HashIndexer {
    partitions: usize,
}

impl HashIndexer {
    pub fn new(partitions: usize) -> Self {
        Self {
            partitions: partitions.max(1),
        }
    }

    pub fn partitions(&self) -> usize {
        self.partitions
    }
}

impl<P: PartitionKey> PointIndexer<P> for HashIndexer {
    fn get_index(&self, point: &P) -> usize {
        fnv1_32(point.partition_key()) as usize % self.partitions
    }
}

/// Constant indexer for a single partition, hash indexer otherwise
pub fn indexer_for<P: PartitionKey + 'static>(partitions: usize) -> Box<dyn PointIndexer<P>> {
    if partitions > 1 {
        Box::new(HashIndexer::new(partitions))
    } else {
        Box::new(ConstantIndexer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Keyed(String);

    impl PartitionKey for Keyed {
        fn partition_key(&self) -> &[u8] {
            self.0.as_bytes()
        }
    }

    #[test]
    fn test_fnv1_known_values() {
        assert_eq!(fnv1_32(b""), 0x811c_9dc5);
        assert_eq!(fnv1_32(b"a"), 0x050c_5d7e);
        assert_eq!(fnv1_32(b"foobar"), 0x31f0_b262);
    }

    #[test]
    fn test_constant_indexer() {
        let indexer = ConstantIndexer;
        assert_eq!(PointIndexer::<Keyed>::get_index(&indexer, &Keyed("host_1".to_string())), 0);
        assert_eq!(PointIndexer::<u32>::get_index(&indexer, &7), 0);
    }

    #[test]
    fn test_hash_indexer_is_deterministic_and_in_range() {
        for partitions in 1..=16 {
            let indexer = HashIndexer::new(partitions);
            for host in 0..200 {
                let key = Keyed(format!("cpu,hostname=host_{}", host));
                let first = indexer.get_index(&key);
                let second = indexer.get_index(&key);
                assert_eq!(first, second);
                assert!(first < partitions);
            }
        }
    }

    #[test]
    fn test_hash_indexer_spreads_keys() {
        let indexer = HashIndexer::new(4);
        let mut seen = [0usize; 4];
        for host in 0..400 {
            let key = Keyed(format!("tags,hostname=host_{}", host));
            seen[indexer.get_index(&key)] += 1;
        }
        assert!(seen.iter().all(|count| *count > 0), "distribution {:?}", seen);
    }

    #[test]
    fn test_indexer_for_picks_by_partition_count() {
        let single = indexer_for::<Keyed>(1);
        let many = indexer_for::<Keyed>(8);
        let key = Keyed("foobar".to_string());
        assert_eq!(single.get_index(&key), 0);
        assert_eq!(many.get_index(&key), 0x31f0_b262usize % 8);
    }

    #[test]
    fn test_zero_partitions_treated_as_one() {
        assert_eq!(HashIndexer::new(0).partitions(), 1);
    }
}
