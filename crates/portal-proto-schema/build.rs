fn main() -> Result<(), Box<dyn std::error::Error>> {
    tonic_prost_build::compile_protos("proto/links/v1/links.proto")?;
    Ok(())
}
