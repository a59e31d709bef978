// plantcare-core/src/tools/crops.rs
use super::{ToolAction, ToolRegistry};
use crate::errors::ToolError;
use crate::models::crop::NewCrop;
use crate::models::tools::{ActionPerformed, ToolParameter, ToolParameterType, ToolSpec};
use crate::store::{CreateRecordError, CropRepository};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;

pub const GET_CULTIVOS_TOOL: &str = "get_cultivos_internal";
pub const CREATE_CULTIVO_TOOL: &str = "create_cultivo_internal";

/// Lists every registered crop.
pub struct GetCultivosTool {
    crops: CropRepository,
}

impl GetCultivosTool {
    pub fn new(crops: CropRepository) -> Self {
        Self { crops }
    }

    pub fn spec() -> ToolSpec {
        ToolSpec::new(
            GET_CULTIVOS_TOOL,
            "Obtiene la lista de todos los cultivos registrados del usuario, con su ubicación, plantas y estado.",
        )
    }
}

#[async_trait]
impl ToolAction for GetCultivosTool {
    async fn call(&self, _arguments: Map<String, Value>) -> Result<Value, ToolError> {
        let crops = self
            .crops
            .list()
            .await
            .map_err(|e| ToolError::execution(GET_CULTIVOS_TOOL, e.to_string()))?;
        serde_json::to_value(crops).map_err(|e| ToolError::execution(GET_CULTIVOS_TOOL, e.to_string()))
    }
}

/// Creates a crop from model-supplied fields.
pub struct CreateCultivoTool {
    crops: CropRepository,
}

impl CreateCultivoTool {
    pub fn new(crops: CropRepository) -> Self {
        Self { crops }
    }

    pub fn spec() -> ToolSpec {
        ToolSpec::new(
            CREATE_CULTIVO_TOOL,
            "Crea un nuevo cultivo. Úsala solo cuando el usuario lo pida y conozcas al menos el nombre y la ubicación.",
        )
        .param(ToolParameter::required(
            "nombre",
            ToolParameterType::String,
            "Nombre del cultivo, por ejemplo 'Tomates del balcón'.",
        ))
        .param(ToolParameter::required(
            "ubicacion",
            ToolParameterType::String,
            "Dónde está el cultivo, por ejemplo 'Interior' o 'Exterior'.",
        ))
        .param(
            ToolParameter::optional(
                "plantas",
                ToolParameterType::Array,
                "Nombres de las plantas del cultivo.",
            )
            .with_items(ToolParameterType::String),
        )
        .param(ToolParameter::optional(
            "deviceId",
            ToolParameterType::String,
            "Identificador del dispositivo de sensores asociado, si lo hay.",
        ))
        .mutating(ActionPerformed::Create)
    }
}

#[async_trait]
impl ToolAction for CreateCultivoTool {
    async fn call(&self, arguments: Map<String, Value>) -> Result<Value, ToolError> {
        let new_crop: NewCrop = serde_json::from_value(Value::Object(arguments))
            .map_err(|e| ToolError::invalid_arguments(CREATE_CULTIVO_TOOL, e.to_string()))?;
        let created = self.crops.create(new_crop).await.map_err(|e| match e {
            CreateRecordError::Validation(v) => ToolError::invalid_arguments(CREATE_CULTIVO_TOOL, v.0),
            CreateRecordError::Store(s) => ToolError::execution(CREATE_CULTIVO_TOOL, s.to_string()),
        })?;
        serde_json::to_value(created)
            .map_err(|e| ToolError::execution(CREATE_CULTIVO_TOOL, e.to_string()))
    }
}

/// Registers the crop tools over a shared repository.
pub fn register_crop_tools(registry: &mut ToolRegistry, crops: CropRepository) -> Result<(), ToolError> {
    registry.register(GetCultivosTool::spec(), Arc::new(GetCultivosTool::new(crops.clone())))?;
    registry.register(CreateCultivoTool::spec(), Arc::new(CreateCultivoTool::new(crops)))?;
    Ok(())
}
