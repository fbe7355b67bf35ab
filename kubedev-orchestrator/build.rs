use kube::CustomResourceExt;
use kubedev_types::KubeDevEnvironment;
use std::fs;

fn main() {
    let _ = fs::create_dir("../crds");
    fs::write(
        "../crds/kubedev.my-project.com_kubedevenvironment_crd.yaml",
        serde_yaml::to_string(&KubeDevEnvironment::crd()).unwrap(),
    )
    .unwrap();
}
