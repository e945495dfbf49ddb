fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 使用内置的 protoc，构建环境不需要预装
    std::env::set_var("PROTOC", protoc_bin_vendored::protoc_bin_path()?);

    let mut config = prost_build::Config::new();
    config.bytes(["."]);
    tonic_build::configure().compile_with_config(
        config,
        &["proto/raft_client.proto"],
        &["proto"],
    )?;
    Ok(())
}
