// Prompt templates for the CV workflows.
// Placeholders are `{name}` and are filled with `fill_template`.

/// Marker the validation prompt asks for when the CV passes every criterion.
pub const VALID_MARKER: &str = "VÁLIDO";

pub const CV_EXTRACTION_QUERY: &str = "curriculum vitae experiencia educación habilidades";

/// Retrieval queries per CV section, used by the improvement workflow.
pub const SECTION_QUERIES: &[(&str, &str)] = &[
    (
        "personal_info",
        "información personal nombre contacto teléfono email",
    ),
    (
        "experience",
        "experiencia laboral trabajo empresa puesto responsabilidades",
    ),
    (
        "education",
        "educación formación académica universidad estudios título",
    ),
    (
        "skills",
        "habilidades competencias técnicas lenguajes programación",
    ),
    (
        "achievements",
        "logros certificaciones premios reconocimientos",
    ),
];

pub const VALIDATION_PROMPT: &str = r#"Analiza el siguiente CV y determina si tiene una estructura correcta y contiene información importante.
Si el documento no es un CV o no tiene apariencia de CV, responde "INCOMPLETO".

CV a analizar:
{cv_content}

Criterios a evaluar:
1. Información personal (nombre, contacto)
2. Experiencia laboral con fechas y descripciones
3. Educación/formación académica
4. Habilidades técnicas o competencias
5. Estructura clara y coherente

Responde únicamente con "VÁLIDO" si cumple TODOS los criterios de forma obligatoria,
o "INCOMPLETO" si le falta cualquiera de ellos. Sé muy estricto en la evaluación."#;

pub const FEEDBACK_PROMPT: &str = r#"El siguiente CV tiene una estructura incorrecta o le falta información importante:

{cv_content}

Proporciona retroalimentación específica sobre:
1. Qué secciones faltan o están incompletas
2. Qué información importante debería agregarse
3. Cómo mejorar la estructura del documento
4. Sugerencias para hacer el CV más atractivo para empleadores

Sé específico y constructivo en tus recomendaciones."#;

pub const SUMMARY_PROMPT: &str = r#"Crea un resumen profesional destacando los puntos más importantes del siguiente CV:

{cv_content}

El resumen debe incluir:
1. Perfil profesional breve
2. Experiencia laboral más relevante (2-3 posiciones principales)
3. Educación destacada
4. Habilidades técnicas clave
5. Logros o certificaciones importantes

Presenta la información de manera clara y atractiva, como si fuera para un reclutador."#;

pub const COMPATIBILITY_PROMPT: &str = r#"Analiza la compatibilidad entre este CV y la oferta laboral:

CV DEL CANDIDATO:
{cv_content}

OFERTA LABORAL:
{job_info}

Proporciona un análisis que incluya:
1. Porcentaje de compatibilidad (0-100%)
2. Habilidades que coinciden
3. Experiencia relevante encontrada
4. Requisitos que NO cumple
5. Sugerencias específicas para mejorar el CV para esta posición
6. Recomendación final (POSTULAR/MEJORAR_CV/NO_COMPATIBLE)

Sé específico y constructivo."#;

pub const IMPROVE_STRUCTURE_PROMPT: &str = r#"Basándote en el siguiente feedback y en las secciones del CV, crea una versión mejorada:

FEEDBACK RECIBIDO:
{feedback}

SECCIONES DEL CV:
{cv_sections}

INSTRUCCIONES:
1. Corrige todas las deficiencias mencionadas en el feedback
2. Mejora la estructura siguiendo estas secciones estándar:
   - Información Personal (nombre, contacto, perfil profesional)
   - Experiencia Profesional (con fechas, empresa, logros específicos)
   - Educación (títulos, instituciones, fechas)
   - Habilidades Técnicas (organizadas por categorías)
   - Certificaciones/Logros (si aplica)
3. Usa un formato profesional y consistente
4. Agrega información que pueda estar faltando basándote en el contexto
5. Mejora la redacción para hacerla más impactante

Responde ÚNICAMENTE con el CV mejorado en texto plano, bien estructurado."#;

pub const FORMAT_CV_PROMPT: &str = r#"Toma el siguiente CV mejorado y dale un formato profesional final:

{improved_cv}

INSTRUCCIONES DE FORMATO:
1. Títulos claros y bien definidos
2. Viñetas (•) para las listas
3. Información organizada de manera lógica y fácil de leer
4. Fechas en un formato consistente
5. Estilo profesional y limpio
6. Espaciado apropiado entre secciones

Responde ÚNICAMENTE con el CV final formateado."#;

/// Substitutes `{name}` placeholders in a single pass over the template.
/// Substituted values are never rescanned, so user text containing `{...}` stays literal.
pub fn fill_template(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let placeholder = vars.iter().copied().find(|&(name, _)| {
            after.starts_with(name) && after[name.len()..].starts_with('}')
        });
        match placeholder {
            Some((name, value)) => {
                out.push_str(value);
                rest = &after[name.len() + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}
