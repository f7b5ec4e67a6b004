// Prompt constants for the description-driven stages: domain detection, feature structuring,
// tech stack recommendation and the client proposal.

pub const DOMAIN_ROLE: &str = "You are a presales architect specializing in domain classification. \
    Analyze the project description and classify it into ONE primary domain.";

/// Replace `{description}` before sending.
pub const DOMAIN_PROMPT_TEMPLATE: &str = r#"Project description:
{description}

Available domains:
- ecommerce: Online stores, retail platforms, shopping sites
- fintech: Banking, payments, financial services, trading platforms
- healthcare: Medical systems, patient management, telemedicine, health records
- education: Learning platforms, course management, educational tools
- saas: Business software, productivity tools, cloud services
- enterprise: Internal business systems, ERP, CRM, workforce management
- mobile_app: Mobile-first applications, native app features
- web_app: Web applications, browser-based tools
- ai_ml: AI/ML focused products, data science platforms
- marketplace: Multi-vendor platforms, peer-to-peer marketplaces
- social_media: Social networks, community platforms, content sharing
- iot: IoT platforms, device management, sensor networks
- blockchain: Crypto, DeFi, NFT, blockchain applications
- unknown: Cannot determine, or several domains equally weighted

Return a JSON object with this EXACT schema:
{"domain": "<one of the labels above>", "confidence": <0.0-1.0>, "reasoning": "<one sentence>"}"#;

pub const STRUCTURING_ROLE: &str = "You are a senior presales architect breaking down \
    project scope into normalized, estimable features.";

/// Replace `{description}` before sending.
pub const STRUCTURING_PROMPT_TEMPLATE: &str = r#"Break the project below into a structured feature list.

Project description:
{description}

Rules:
1. Extract ALL features mentioned in the description; avoid duplicates.
2. Use standard industry names for features (e.g. "User Authentication", "Payment Gateway").
3. Assign complexity "low", "medium" or "high":
   - low: standard CRUD, basic UI, simple integrations
   - medium: complex business logic, third-party APIs, real-time features
   - high: advanced algorithms, complex integrations, compliance, scalability challenges
4. List the concrete subfeatures that make up each feature when they are clear from the description.

Return a JSON object with this EXACT schema:
{
  "features": [
    {"name": "string", "complexity": "low|medium|high", "subfeatures": [{"name": "string"}]}
  ]
}"#;

pub const TECH_STACK_ROLE: &str = "You are a technical architect recommending a modern, \
    production-ready tech stack. Be concise.";

/// Replace `{domain}` and `{feature_list}` before sending.
pub const TECH_STACK_PROMPT_TEMPLATE: &str = r#"Domain: {domain}

Features:
{feature_list}

Recommend a tech stack for this project.

Return a JSON object with this EXACT schema:
{
  "frontend": ["string"],
  "backend": ["string"],
  "database": ["string"],
  "infrastructure": ["string"],
  "third_party_services": ["string"],
  "justification": "string"
}"#;

pub const PROPOSAL_ROLE: &str = "You are a presales architect writing client-ready proposals. \
    Tone is professional and solution-oriented, written for executives; keep every section concise.";

/// Replace `{domain}`, `{total_hours}`, `{tech_summary}`, `{feature_summary}` and
/// `{description}` before sending.
pub const PROPOSAL_PROMPT_TEMPLATE: &str = r#"Domain: {domain}
Total estimated hours: {total_hours}
Tech stack: {tech_summary}

Key features:
{feature_summary}

Project description:
{description}

Write a client-ready proposal.

Return a JSON object with this EXACT schema:
{
  "executive_summary": "2-3 sentences",
  "scope_of_work": "3-4 sentences",
  "deliverables": ["5-7 items"],
  "project_timeline": [{"phase": "string", "duration": "string", "description": "string"}],
  "timeline_weeks": number,
  "risks": ["3-4 items"],
  "mitigation_strategies": ["3-4 items, one per risk"],
  "assumptions": ["5-8 items"],
  "client_dependencies": ["4-6 items"]
}

Rules:
- project_timeline has 4-6 phases covering the full delivery lifecycle.
- timeline_weeks is based on {total_hours} hours at 40 hours per week for the whole team."#;
