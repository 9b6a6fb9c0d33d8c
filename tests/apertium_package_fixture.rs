//! Exercises the filesystem side of the Apertium package manager (§4.C)
//! against a hand-built `.deb` fixture instead of the real repository, the
//! way `tests/test_apertium_repository.py`'s `test_extract_pair_package` /
//! `test_import_modes` / `test_install_pair_package_reversed` exercise it
//! against a downloaded one. Builds its own ar/tar/gzip fixture so the test
//! needs no network access.

use std::io::Write;

use es_translator::apertium_repository::ApertiumRepository;

/// Builds a `package.deb` at `dest` whose `data.tar.gz` contains
/// `usr/share/apertium/{modes/<mode_name>.mode, <pair_dir>/marker}`.
fn build_fixture_deb(dest: &std::path::Path, pair_dir: &str, mode_name: &str) {
    let mut tar_buf = Vec::new();
    {
        let mut builder = tar::Builder::new(&mut tar_buf);

        let mode_contents = b"mode file referencing /usr/share/apertium/data\n".to_vec();
        let mut header = tar::Header::new_gnu();
        header.set_size(mode_contents.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(
                &mut header,
                format!("usr/share/apertium/modes/{mode_name}.mode"),
                mode_contents.as_slice(),
            )
            .unwrap();

        let marker_contents = b"installed\n".to_vec();
        let mut header = tar::Header::new_gnu();
        header.set_size(marker_contents.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(
                &mut header,
                format!("usr/share/apertium/{pair_dir}/marker"),
                marker_contents.as_slice(),
            )
            .unwrap();

        builder.finish().unwrap();
    }

    let mut gz_buf = Vec::new();
    {
        let mut encoder = flate2::write::GzEncoder::new(&mut gz_buf, flate2::Compression::fast());
        encoder.write_all(&tar_buf).unwrap();
        encoder.finish().unwrap();
    }

    let deb_file = std::fs::File::create(dest).unwrap();
    let mut ar_builder = ar::Builder::new(deb_file);
    let header = ar::Header::new(b"data.tar.gz".to_vec(), gz_buf.len() as u64);
    ar_builder.append(&header, gz_buf.as_slice()).unwrap();
}

#[test]
fn extract_alias_and_import_modes_roundtrip() {
    let tmp = tempfile::tempdir().unwrap();
    let repo = ApertiumRepository::new(tmp.path());

    let package_dir = tmp.path().join("apertium-en-es");
    std::fs::create_dir_all(&package_dir).unwrap();
    let deb_path = package_dir.join("package.deb");
    build_fixture_deb(&deb_path, "apertium-en-es", "en-es");

    let extracted = repo.extract_pair_package(&deb_path).unwrap();
    assert!(extracted.join("modes/en-es.mode").is_file());
    assert!(extracted.join("apertium-en-es/marker").is_file());

    repo.create_pair_package_alias(&extracted).unwrap();
    let alias_dir = tmp.path().join("apertium-eng-spa");
    assert!(alias_dir.exists(), "alpha-3 alias directory should exist");

    repo.clear_modes().unwrap();
    assert!(!tmp.path().join("modes").is_dir());

    repo.import_modes(false).unwrap();
    assert!(tmp.path().join("modes/en-es.mode").is_file());
}

#[test]
fn is_apertium_pair_matches_three_part_names() {
    use es_translator::apertium_repository::{is_apertium_pair, PackageDescriptor};
    use std::collections::HashMap;

    let mut fields = HashMap::new();
    fields.insert("Package".to_string(), "apertium-en-es".to_string());
    assert!(is_apertium_pair(&PackageDescriptor { fields }));

    let mut fields = HashMap::new();
    fields.insert("Package".to_string(), "en-es".to_string());
    assert!(!is_apertium_pair(&PackageDescriptor { fields }));
}
