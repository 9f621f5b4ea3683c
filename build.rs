use std::path::PathBuf;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("cargo:rerun-if-changed=proto/provider.proto");

    let proto_path = PathBuf::from("proto/provider.proto");
    if !proto_path.exists() {
        return Err(format!("missing protocol definition: {}", proto_path.display()).into());
    }

    // Ensure output directory exists.
    let out_dir = PathBuf::from("src/generated");
    std::fs::create_dir_all(&out_dir)?;

    // Only the server half is needed; the host owns the client.
    tonic_build::configure()
        .build_server(true)
        .build_client(false)
        .out_dir(&out_dir)
        .compile_protos(&["proto/provider.proto"], &["proto"])?;

    Ok(())
}
