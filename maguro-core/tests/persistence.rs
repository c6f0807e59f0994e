//! Save, load, and corruption handling for the single-file format.

use maguro_core::{DistanceKind, HnswConfig, HnswIndex, IndexError, IndexErrorCode};
use rand::{Rng, SeedableRng, rngs::SmallRng};
use rstest::rstest;
use std::fs;
use tempfile::tempdir;

fn random_vectors(count: usize, dim: usize, seed: u64) -> Vec<Vec<f32>> {
    let mut rng = SmallRng::seed_from_u64(seed);
    (0..count)
        .map(|_| (0..dim).map(|_| rng.gen_range(-1.0_f32..1.0)).collect())
        .collect()
}

fn built_index(vectors: &[Vec<f32>], kind: DistanceKind) -> HnswIndex {
    let mut index = HnswIndex::new(vectors[0].len(), kind).expect("index");
    for vector in vectors {
        index.add_vector(vector).expect("add");
    }
    index
        .build(HnswConfig::new(6, 40).expect("config").with_rng_seed(9))
        .expect("build");
    index
}

#[rstest]
#[case::l2(DistanceKind::L2)]
#[case::angular(DistanceKind::Angular)]
#[case::dot(DistanceKind::Dot)]
fn loaded_indexes_answer_like_the_resident_original(#[case] kind: DistanceKind) {
    let vectors = random_vectors(200, 16, 41);
    let resident = built_index(&vectors, kind);

    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("index.mgr");
    resident.save(&path).expect("save");

    let loaded = HnswIndex::load(&path).expect("load");
    assert_eq!(loaded.len(), resident.len());
    assert_eq!(loaded.dimension(), resident.dimension());
    assert_eq!(loaded.distance_kind(), kind);

    for query in random_vectors(10, 16, 83) {
        let expected = resident.search(&query, 5, 50).expect("resident search");
        let actual = loaded.search(&query, 5, 50).expect("mapped search");
        let expected_ids: Vec<_> = expected.iter().map(|n| n.id).collect();
        let actual_ids: Vec<_> = actual.iter().map(|n| n.id).collect();
        assert_eq!(actual_ids, expected_ids, "traversal diverged after reload");
    }
}

#[test]
fn loaded_graphs_match_the_resident_adjacency() {
    let vectors = random_vectors(120, 8, 13);
    let resident = built_index(&vectors, DistanceKind::L2);

    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("index.mgr");
    resident.save(&path).expect("save");
    let loaded = HnswIndex::load(&path).expect("load");

    assert_eq!(
        loaded.max_level().expect("entry"),
        resident.max_level().expect("entry")
    );
    for node in 0..vectors.len() {
        let top = resident.node_level(node).expect("level");
        assert_eq!(loaded.node_level(node).expect("level"), top);
        for level in 0..=top {
            assert_eq!(
                loaded.neighbours_of(node, level).expect("list"),
                resident.neighbours_of(node, level).expect("list"),
                "node {node} layer {level}"
            );
        }
    }
}

#[test]
fn resaving_a_mapped_index_is_byte_identical() {
    let vectors = random_vectors(80, 4, 55);
    let resident = built_index(&vectors, DistanceKind::Angular);

    let dir = tempdir().expect("tempdir");
    let original = dir.path().join("a.mgr");
    let copy = dir.path().join("b.mgr");
    resident.save(&original).expect("save");

    let loaded = HnswIndex::load(&original).expect("load");
    loaded.save(&copy).expect("resave");
    assert_eq!(
        fs::read(&original).expect("read original"),
        fs::read(&copy).expect("read copy")
    );
}

#[test]
fn loaded_indexes_are_immutable() {
    let vectors = random_vectors(40, 4, 3);
    let resident = built_index(&vectors, DistanceKind::L2);

    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("index.mgr");
    resident.save(&path).expect("save");
    let mut loaded = HnswIndex::load(&path).expect("load");

    let err = loaded.add_vector(&[0.0; 4]).expect_err("add must fail");
    assert!(matches!(err, IndexError::AlreadyBuilt));
    let err = loaded
        .build(HnswConfig::default())
        .expect_err("build must fail");
    assert!(matches!(err, IndexError::AlreadyBuilt));
}

#[test]
fn saving_an_unbuilt_index_is_rejected() {
    let mut index = HnswIndex::new(4, DistanceKind::L2).expect("index");
    index.add_vector(&[0.0; 4]).expect("add");
    let dir = tempdir().expect("tempdir");
    let err = index
        .save(dir.path().join("index.mgr"))
        .expect_err("save must fail");
    assert!(matches!(err, IndexError::EmptyIndex));
}

#[test]
fn loading_a_missing_file_is_an_io_error() {
    let dir = tempdir().expect("tempdir");
    let err = HnswIndex::load(dir.path().join("absent.mgr")).expect_err("load must fail");
    assert_eq!(err.code(), IndexErrorCode::Io);
}

#[test]
fn truncated_files_are_rejected_as_corrupt() {
    let vectors = random_vectors(60, 4, 19);
    let resident = built_index(&vectors, DistanceKind::L2);

    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("index.mgr");
    resident.save(&path).expect("save");

    let bytes = fs::read(&path).expect("read");
    for keep in [16, 60, bytes.len() - 9] {
        let truncated = dir.path().join(format!("trunc-{keep}.mgr"));
        fs::write(&truncated, &bytes[..keep]).expect("write");
        let err = HnswIndex::load(&truncated).expect_err("load must fail");
        assert!(
            matches!(err, IndexError::Corrupt { .. }),
            "{keep}-byte prefix produced {err:?}"
        );
    }
}

#[test]
fn bad_magic_and_version_are_rejected_as_corrupt() {
    let vectors = random_vectors(30, 4, 23);
    let resident = built_index(&vectors, DistanceKind::L2);

    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("index.mgr");
    resident.save(&path).expect("save");
    let bytes = fs::read(&path).expect("read");

    let mut bad_magic = bytes.clone();
    bad_magic[0] ^= 0xFF;
    let magic_path = dir.path().join("magic.mgr");
    fs::write(&magic_path, &bad_magic).expect("write");
    let err = HnswIndex::load(&magic_path).expect_err("load must fail");
    assert!(matches!(err, IndexError::Corrupt { .. }));

    let mut bad_version = bytes;
    bad_version[4] = 0xEE;
    let version_path = dir.path().join("version.mgr");
    fs::write(&version_path, &bad_version).expect("write");
    let err = HnswIndex::load(&version_path).expect_err("load must fail");
    assert!(matches!(err, IndexError::Corrupt { .. }));
}

#[test]
fn failed_searches_leave_a_mapped_index_usable() {
    let vectors = random_vectors(50, 8, 37);
    let resident = built_index(&vectors, DistanceKind::L2);

    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("index.mgr");
    resident.save(&path).expect("save");
    let loaded = HnswIndex::load(&path).expect("load");

    let err = loaded.search(&[1.0; 3], 5, 20).expect_err("dimension check");
    assert!(matches!(err, IndexError::DimensionMismatch { .. }));
    let hits = loaded.search(&vectors[0], 1, 20).expect("search still works");
    assert_eq!(hits[0].id, 0);
}
