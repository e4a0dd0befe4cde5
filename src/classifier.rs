use crate::error::ModelError;
use crate::preprocess::INPUT_SIZE;
use log::{info, warn};
use ndarray::Array4;
use serde::Serialize;
use std::path::Path;
use tract_onnx::prelude::*;

/// Anything that turns a preprocessed `[1, H, W, 3]` batch into per-class
/// scores for that single image.
pub trait Classifier: Send + Sync {
    fn classify(&self, input: &Array4<f32>) -> Result<Vec<f32>, ModelError>;

    fn summary(&self) -> ModelSummary;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelSummary {
    pub engine: String,
    pub load_variant: String,
    pub input_shape: Vec<String>,
    pub output_shape: Vec<String>,
    pub node_count: usize,
}

type Plan = TypedRunnableModel<TypedModel>;

#[derive(Debug, Clone, Copy)]
enum LoadVariant {
    // Input pinned to f32[1, 224, 224, 3], graph fully optimized.
    PinnedInput,
    // Shapes as declared in the artifact, decluttered only.
    DeclaredShapes,
}

impl LoadVariant {
    const ALL: [LoadVariant; 2] = [LoadVariant::PinnedInput, LoadVariant::DeclaredShapes];

    fn name(self) -> &'static str {
        match self {
            LoadVariant::PinnedInput => "pinned-input",
            LoadVariant::DeclaredShapes => "declared-shapes",
        }
    }

    fn build(self, path: &Path) -> TractResult<Plan> {
        let model = tract_onnx::onnx().model_for_path(path)?;
        match self {
            LoadVariant::PinnedInput => {
                let size = INPUT_SIZE as usize;
                model
                    .with_input_fact(
                        0,
                        InferenceFact::dt_shape(f32::datum_type(), tvec!(1, size, size, 3)),
                    )?
                    .into_optimized()?
                    .into_runnable()
            }
            LoadVariant::DeclaredShapes => model.into_typed()?.into_decluttered()?.into_runnable(),
        }
    }
}

pub struct TractClassifier {
    plan: Plan,
    summary: ModelSummary,
}

impl TractClassifier {
    /// Loads an ONNX artifact, trying each load variant in turn.
    pub fn load(path: &Path) -> Result<Self, ModelError> {
        if !path.is_file() {
            return Err(ModelError::NotFound(path.to_path_buf()));
        }

        let mut attempts = Vec::new();
        for variant in LoadVariant::ALL {
            match variant.build(path) {
                Ok(plan) => {
                    info!("loaded model {} ({})", path.display(), variant.name());
                    return Ok(Self::new(plan, variant));
                }
                Err(e) => {
                    warn!("{} load of {} failed: {:#}", variant.name(), path.display(), e);
                    attempts.push(format!("{}: {:#}", variant.name(), e));
                }
            }
        }

        Err(ModelError::Load {
            path: path.to_path_buf(),
            attempts: attempts.join("; "),
        })
    }

    fn new(plan: Plan, variant: LoadVariant) -> Self {
        let model = plan.model();
        let dims = |fact: &TypedFact| fact.shape.iter().map(|d| d.to_string()).collect();
        let summary = ModelSummary {
            engine: "tract-onnx".to_string(),
            load_variant: variant.name().to_string(),
            input_shape: model.input_fact(0).map(dims).unwrap_or_default(),
            output_shape: model.output_fact(0).map(dims).unwrap_or_default(),
            node_count: model.nodes().len(),
        };
        TractClassifier { plan, summary }
    }
}

impl Classifier for TractClassifier {
    fn classify(&self, input: &Array4<f32>) -> Result<Vec<f32>, ModelError> {
        let shape = input.shape().to_vec();
        let data: Vec<f32> = input.iter().copied().collect();
        let tensor: Tensor = tract_ndarray::ArrayD::from_shape_vec(shape, data)
            .map_err(|e| ModelError::Inference(e.to_string()))?
            .into();

        let outputs = self
            .plan
            .run(tvec!(tensor.into()))
            .map_err(|e| ModelError::Inference(format!("{:#}", e)))?;
        let output = outputs
            .first()
            .ok_or_else(|| ModelError::Output("model produced no outputs".to_string()))?;
        let view = output
            .to_array_view::<f32>()
            .map_err(|e| ModelError::Output(format!("{:#}", e)))?;

        Ok(view.iter().copied().collect())
    }

    fn summary(&self) -> ModelSummary {
        self.summary.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prost::Message;
    use std::io::Write;
    use tract_onnx::pb;
    use tract_onnx::pb::attribute_proto::AttributeType;
    use tract_onnx::pb::tensor_proto::DataType;
    use tract_onnx::pb::tensor_shape_proto::{dimension, Dimension};

    fn float_value(name: &str, dims: &[i64]) -> pb::ValueInfoProto {
        let shape = pb::TensorShapeProto {
            dim: dims
                .iter()
                .map(|d| Dimension {
                    value: Some(dimension::Value::DimValue(*d)),
                    ..Default::default()
                })
                .collect(),
        };
        pb::ValueInfoProto {
            name: name.to_string(),
            r#type: Some(pb::TypeProto {
                value: Some(pb::type_proto::Value::TensorType(pb::type_proto::Tensor {
                    elem_type: DataType::Float as i32,
                    shape: Some(shape),
                })),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn node(
        op: &str,
        inputs: &[&str],
        output: &str,
        attribute: Vec<pb::AttributeProto>,
    ) -> pb::NodeProto {
        pb::NodeProto {
            op_type: op.to_string(),
            name: output.to_string(),
            input: inputs.iter().map(|i| i.to_string()).collect(),
            output: vec![output.to_string()],
            attribute,
            ..Default::default()
        }
    }

    fn write_model(graph: pb::GraphProto) -> tempfile::NamedTempFile {
        let model = pb::ModelProto {
            ir_version: 7,
            opset_import: vec![pb::OperatorSetIdProto {
                domain: String::new(),
                version: 13,
            }],
            graph: Some(graph),
            ..Default::default()
        };
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&model.encode_to_vec()).unwrap();
        file
    }

    // image [1,224,224,3] -> mean over H and W -> softmax over the 3 channels
    fn channel_mean_model() -> tempfile::NamedTempFile {
        let axes = pb::AttributeProto {
            name: "axes".to_string(),
            r#type: AttributeType::Ints as i32,
            ints: vec![1, 2],
            ..Default::default()
        };
        write_model(pb::GraphProto {
            name: "channel-mean".to_string(),
            node: vec![
                node("ReduceMean", &["image"], "pooled", vec![axes]),
                node("Softmax", &["pooled"], "scores", vec![]),
            ],
            input: vec![float_value("image", &[1, 224, 224, 3])],
            output: vec![float_value("scores", &[1, 1, 1, 3])],
            ..Default::default()
        })
    }

    #[test]
    fn classifies_nhwc_input_through_tract() {
        let file = channel_mean_model();
        let classifier = TractClassifier::load(file.path()).unwrap();

        let summary = classifier.summary();
        assert_eq!(summary.load_variant, "pinned-input");
        assert_eq!(summary.input_shape, vec!["1", "224", "224", "3"]);
        assert!(summary.node_count > 0);

        // channel c holds c * 0.5 everywhere, so the channel means are 0, 0.5, 1
        let input = Array4::from_shape_fn((1, 224, 224, 3), |(_, _, _, c)| c as f32 * 0.5);
        let scores = classifier.classify(&input).unwrap();

        assert_eq!(scores.len(), 3);
        assert!((scores.iter().sum::<f32>() - 1.0).abs() < 1e-5);
        assert!(scores[0] < scores[1] && scores[1] < scores[2]);
        let expected = 1.0 / (1.0 + 0.5f32.exp() + 1.0f32.exp());
        assert!((scores[0] - expected).abs() < 1e-4);
    }

    #[test]
    fn falls_back_to_declared_shapes() {
        // a [1,4] x [4,3] head cannot accept the pinned image input
        let weights = pb::TensorProto {
            name: "weights".to_string(),
            dims: vec![4, 3],
            data_type: DataType::Float as i32,
            float_data: (0..12).map(|v| v as f32 / 12.0).collect(),
            ..Default::default()
        };
        let file = write_model(pb::GraphProto {
            name: "dense-head".to_string(),
            node: vec![node("MatMul", &["features", "weights"], "logits", vec![])],
            initializer: vec![weights],
            input: vec![float_value("features", &[1, 4])],
            output: vec![float_value("logits", &[1, 3])],
            ..Default::default()
        });

        let classifier = TractClassifier::load(file.path()).unwrap();
        let summary = classifier.summary();
        assert_eq!(summary.load_variant, "declared-shapes");
        assert_eq!(summary.input_shape, vec!["1", "4"]);
        assert_eq!(summary.output_shape, vec!["1", "3"]);
    }

    #[test]
    fn missing_artifact_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = TractClassifier::load(&dir.path().join("Kidney.onnx"))
            .err()
            .unwrap();
        assert!(matches!(err, ModelError::NotFound(_)));
    }

    #[test]
    fn corrupt_artifact_reports_every_variant() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"this is not a protobuf model").unwrap();

        match TractClassifier::load(file.path()) {
            Err(ModelError::Load { attempts, .. }) => {
                assert!(attempts.contains("pinned-input"));
                assert!(attempts.contains("declared-shapes"));
            }
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("garbage loaded as a model"),
        }
    }
}
