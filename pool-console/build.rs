fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Rebuild if translations change
    println!("cargo:rerun-if-changed=i18n");

    // Emit version information for `--version`
    vergen::EmitBuilder::builder()
        .git_sha(true)
        .git_commit_date()
        .emit()?;

    println!("cargo:rerun-if-env-changed=VERGEN_GIT_COMMIT_DATE");
    println!("cargo:rerun-if-env-changed=VERGEN_GIT_SHA");

    Ok(())
}
