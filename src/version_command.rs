pub fn version_command() {
    println!("zfs-s3-backup {}", env!("CARGO_PKG_VERSION"));
}
