use std::path::Path;

pub fn run(root: &Path, port: u16) -> anyhow::Result<()> {
    // Fail before binding if the root is unusable.
    drop(super::open_engine(root)?);

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(plays_server::serve(root, port))
}
