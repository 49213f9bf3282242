use std::fs;
use std::path::Path;

fn main() {
    if std::env::var("CARGO_CFG_TARGET_OS").as_deref() == Ok("windows") {
        let mut res = winres::WindowsResource::new();
        // Per-monitor DPI awareness keeps the alert popup crisp; no elevation needed
        res.set_manifest(r#"
<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<assembly xmlns="urn:schemas-microsoft-com:asm.v1" manifestVersion="1.0">
  <trustInfo xmlns="urn:schemas-microsoft-com:asm.v3">
    <security>
      <requestedPrivileges>
        <requestedExecutionLevel level="asInvoker" uiAccess="false"/>
      </requestedPrivileges>
    </security>
  </trustInfo>
  <application xmlns="urn:schemas-microsoft-com:asm.v3">
    <windowsSettings>
      <dpiAware xmlns="http://schemas.microsoft.com/SMI/2005/WindowsSettings">true/pm</dpiAware>
    </windowsSettings>
  </application>
</assembly>
"#);
        if let Err(e) = res.compile() {
            println!("cargo:warning=could not embed Windows manifest: {}", e);
        }
    }

    // Copy README to release folder
    let out_dir = std::env::var("OUT_DIR").unwrap_or_default();
    if out_dir.contains("release") {
        let Ok(manifest_dir) = std::env::var("CARGO_MANIFEST_DIR") else {
            return;
        };
        let src = Path::new(&manifest_dir).join("README.md");
        let target_dir = Path::new(&manifest_dir).join("target").join("release");
        let dst = target_dir.join("README.md");

        if src.exists() {
            let _ = fs::create_dir_all(&target_dir);
            let _ = fs::copy(&src, &dst);
        }
    }
}
