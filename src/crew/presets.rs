//! The two crews the study assistant ships with.

use std::collections::HashMap;
use std::sync::Arc;

use super::agent::{Agent, AgentTool, RetrievalTool};
use super::fence::strip_code_fence;
use super::knowledge::KnowledgeSource;
use super::runtime::{Crew, Process};
use super::task::Task;
use crate::core::errors::CrewError;
use crate::llm::LlmService;
use crate::rag::QueryEngine;

pub const LECTURE_TOOL_NAME: &str = "Lecture Record Query Tool";
const LECTURE_TOOL_DESCRIPTION: &str =
    "Use this tool to lookup information from the lecture recording and textbook";

const WEB_DESIGNER_BACKSTORY: &str = "An experienced web designer who knows how to create web pages.";

/// Knowledge Expert -> Advisor -> Web Designer, answering one student question.
pub struct TeachingAssistant {
    crew: Crew,
}

impl TeachingAssistant {
    /// `lookup` backs the Knowledge Expert's retrieval tool.
    pub fn new(
        lookup: Arc<dyn QueryEngine>,
        llm: LlmService,
        max_tool_calls: usize,
    ) -> Result<Self, CrewError> {
        let knowledge_expert = Agent::new(
            "Knowledge Expert",
            "Provide accurate and reliable information on a topic",
            "An expert who knows a lot about a topic",
        )
        .with_tool(AgentTool::Retrieval(RetrievalTool::new(
            LECTURE_TOOL_NAME,
            LECTURE_TOOL_DESCRIPTION,
            lookup,
        )));

        let advisor = Agent::new(
            "Advisor",
            "Answer a question from a student clearly and appropriately, with sufficient information",
            "An experienced advisor working at a university",
        );

        let web_designer = Agent::new(
            "Web Designer",
            "Convert the answer into a HTML format.",
            WEB_DESIGNER_BACKSTORY,
        );

        let crew = Crew::builder("Study Assistant: Answering Questions")
            .llm(llm)
            .max_tool_calls(max_tool_calls)
            .process(Process::Sequential)
            .agent(knowledge_expert)
            .agent(advisor)
            .agent(web_designer)
            .task(Task::new(
                "Knowledge Expert Task",
                "Summarize information related to a question from a student: {question}",
                "A collection of bullet points detailing the major insights about a given question from a student.",
                "Knowledge Expert",
            ))
            .task(
                Task::new(
                    "Advisor Task",
                    "Answer a question from a student clearly and appropriately, with sufficient information using the information from knowledge expert: {question}",
                    "A clear main response to a given question from a student and a detailed list of bullet points explaining the reasons.",
                    "Advisor",
                )
                .with_context("Knowledge Expert Task"),
            )
            .task(
                Task::new(
                    "Web Designer Task",
                    "Convert the answer into a HTML format",
                    "A html content with the answers to the question from a student. The content can be placed within the <div> tag. The content must be simple and easy to read.",
                    "Web Designer",
                )
                .with_context("Advisor Task"),
            )
            .build()?;

        Ok(Self { crew })
    }

    pub fn crew(&self) -> &Crew {
        &self.crew
    }

    /// Answers `question` as an HTML fragment.
    pub async fn invoke(&self, question: &str) -> Result<String, CrewError> {
        let inputs = HashMap::from([("question".to_string(), question.to_string())]);
        let output = self.crew.kickoff(&inputs).await?;
        Ok(strip_code_fence(&output.raw))
    }
}

/// Topic Selector -> Question Generator -> Web Designer, producing practice questions.
pub struct QuestionSetter {
    crew: Crew,
}

impl QuestionSetter {
    pub fn new(
        main_material: Arc<KnowledgeSource>,
        past_questions: Arc<KnowledgeSource>,
        llm: LlmService,
        max_tool_calls: usize,
    ) -> Result<Self, CrewError> {
        let topic_selector = Agent::new(
            "Topic_Selector",
            "Select five topics randomly to generate practice questions for students",
            "An experienced teacher who is very good at selecting good topics from main material for exam preparation",
        )
        .with_knowledge(main_material.clone());

        let question_generator = Agent::new(
            "Question_Generator",
            "Generate questions for students to help them learn. Referring to past questions to generate new questions.",
            "An experienced question generator who knows how to create questions",
        )
        .with_knowledge(past_questions.clone());

        let web_designer = Agent::new(
            "Web Designer",
            "Convert the questions and answers into a HTML format.",
            WEB_DESIGNER_BACKSTORY,
        );

        let crew = Crew::builder("Question Setter")
            .llm(llm)
            .max_tool_calls(max_tool_calls)
            .process(Process::Sequential)
            .knowledge(past_questions)
            .knowledge(main_material)
            .agent(topic_selector)
            .agent(question_generator)
            .agent(web_designer)
            .task(Task::new(
                "Topic Selector Task",
                "Select five topics randomly to generate practice questions for exam preparation.",
                "A list of five topics and the important points of those topics.",
                "Topic_Selector",
            ))
            .task(
                Task::new(
                    "Question Generator Task",
                    "Generate questions for students to help them prepare for exams using the information from the topic selector and past questions.",
                    "A list of 5 questions and the answers for students to help them learn.",
                    "Question_Generator",
                )
                .with_context("Topic Selector Task"),
            )
            .task(
                Task::new(
                    "Web Designer Task",
                    "Convert the questions into a HTML format",
                    "A html content with the questions and answers for students to learn. The content can be placed within the <div> tag. The content must include only five questions and their answers.",
                    "Web Designer",
                )
                .with_context("Question Generator Task"),
            )
            .build()?;

        Ok(Self { crew })
    }

    pub fn crew(&self) -> &Crew {
        &self.crew
    }

    /// Generates five practice questions with answers as an HTML fragment.
    pub async fn invoke(&self) -> Result<String, CrewError> {
        let output = self.crew.kickoff(&HashMap::new()).await?;
        Ok(strip_code_fence(&output.raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::errors::GenerationError;
    use crate::llm::mock::MockProvider;
    use crate::llm::ChatRequest;
    use crate::rag::{ChunkerConfig, Corpus, Document, NodeBuilder, VectorIndex, VectorQueryEngine};
    use crate::rag::document::DocumentId;

    fn document(corpus: Corpus, name: &str, text: &str) -> Document {
        Document {
            id: DocumentId(format!("{}/{}", corpus, name)),
            text: text.to_string(),
            corpus,
            file_name: name.to_string(),
            page: None,
        }
    }

    async fn index(llm: &LlmService, docs: &[Document]) -> Arc<VectorIndex> {
        let nodes = NodeBuilder::new(ChunkerConfig::default()).build(docs);
        Arc::new(VectorIndex::build(nodes, llm).await.unwrap())
    }

    fn system_prompt(request: &ChatRequest) -> &str {
        request.messages[0].content.as_str()
    }

    /// Plays each agent of the answering crew by role.
    fn teaching_mock() -> MockProvider {
        MockProvider::default().with_responder(|request| {
            let system = system_prompt(request);
            let transcript = request.transcript();
            if system.starts_with("You are Knowledge Expert") {
                if transcript.contains("Tool `Lecture Record Query Tool` result:") {
                    Ok(r#"{"type":"final","content":"- Backpropagation applies the chain rule\n- It computes gradients layer by layer"}"#.to_string())
                } else {
                    Ok(r#"{"type":"tool_call","tool_name":"Lecture Record Query Tool","tool_args":{"query":"backpropagation"}}"#.to_string())
                }
            } else if system.starts_with("You are Advisor") {
                Ok("Backpropagation answers the question 'What is backpropagation?': it propagates errors backwards.\n- Uses the chain rule".to_string())
            } else if system.starts_with("You are Web Designer") {
                Ok("```html\n<div><h2>What is backpropagation?</h2><p>It propagates errors backwards.</p></div>\n```".to_string())
            } else {
                // Answer synthesis inside the retrieval tool.
                Ok("Backpropagation applies the chain rule to compute gradients.".to_string())
            }
        })
    }

    async fn teaching_assistant(mock: &MockProvider) -> TeachingAssistant {
        let llm = LlmService::new(Arc::new(mock.clone()));
        let docs = vec![
            document(
                Corpus::Record,
                "lecture4.txt",
                "Backpropagation applies the chain rule to compute gradients.",
            ),
            document(
                Corpus::Textbook,
                "chapter6.txt",
                "Convolutional layers share weights across positions.",
            ),
        ];
        let engine = VectorQueryEngine::new(index(&llm, &docs).await, llm.clone(), 2);
        TeachingAssistant::new(Arc::new(engine), llm, 5).unwrap()
    }

    #[tokio::test]
    async fn answers_backpropagation_question_as_html() {
        let mock = teaching_mock();
        let ta = teaching_assistant(&mock).await;

        let inputs = HashMap::from([(
            "question".to_string(),
            "What is backpropagation?".to_string(),
        )]);
        let output = ta.crew().kickoff(&inputs).await.unwrap();

        let expert = &output.tasks_output[0];
        assert_eq!(expert.task, "Knowledge Expert Task");
        assert!(!expert.raw.trim().is_empty());
        assert!(output.tasks_output[1].raw.contains("What is backpropagation?"));

        let html = ta.invoke("What is backpropagation?").await.unwrap();
        assert!(html.starts_with("<div>"));
        assert!(html.ends_with("</div>"));
        assert!(!html.contains("```"));
    }

    #[tokio::test]
    async fn knowledge_expert_consults_the_lecture_tool() {
        let mock = teaching_mock();
        let ta = teaching_assistant(&mock).await;

        ta.invoke("What is backpropagation?").await.unwrap();

        // expert tool call, tool synthesis, expert final, advisor, web designer
        assert_eq!(mock.chat_calls(), 5);
        let advisor_request = mock
            .requests()
            .into_iter()
            .find(|r| system_prompt(r).starts_with("You are Advisor"))
            .unwrap();
        assert!(advisor_request
            .transcript()
            .contains("Backpropagation applies the chain rule"));
    }

    #[tokio::test]
    async fn rate_limited_advisor_surfaces_as_rate_limit() {
        let mock = MockProvider::default().with_responder(|request| {
            if system_prompt(request).starts_with("You are Advisor") {
                Err(GenerationError::RateLimited("429".to_string()))
            } else {
                Ok(r#"{"type":"final","content":"notes"}"#.to_string())
            }
        });
        let ta = teaching_assistant(&mock).await;

        let err = ta.invoke("What is backpropagation?").await.unwrap_err();

        assert!(err.is_rate_limited());
        assert!(matches!(err, CrewError::Task { task, .. } if task == "Advisor Task"));
    }

    #[tokio::test]
    async fn question_setter_uses_bound_knowledge() {
        let mock = MockProvider::default().with_responder(|request| {
            let system = system_prompt(request);
            if system.starts_with("You are Topic_Selector") {
                Ok("1. Entropy\n2. Gradient descent".to_string())
            } else if system.starts_with("You are Question_Generator") {
                Ok("Q1. Define entropy. A: ...".to_string())
            } else {
                Ok("~~~html\n<div><ol><li>Define entropy.</li></ol></div>\n~~~".to_string())
            }
        });
        let llm = LlmService::new(Arc::new(mock.clone()));

        let main = index(
            &llm,
            &[document(Corpus::Knowledge, "main.txt", "Entropy measures uncertainty in a distribution.")],
        )
        .await;
        let past = index(
            &llm,
            &[document(Corpus::Knowledge, "past.txt", "Past exam: define cross entropy loss.")],
        )
        .await;
        let setter = QuestionSetter::new(
            Arc::new(KnowledgeSource::from_index("main material", main, llm.clone(), 3)),
            Arc::new(KnowledgeSource::from_index("past questions", past, llm.clone(), 3)),
            llm,
            5,
        )
        .unwrap();

        let html = setter.invoke().await.unwrap();

        assert_eq!(html, "<div><ol><li>Define entropy.</li></ol></div>");
        let requests = mock.requests();
        assert!(requests[0].transcript().contains("[main material] Entropy measures uncertainty"));
        assert!(requests[1].transcript().contains("[past questions] Past exam"));
        assert!(requests[1].transcript().contains("1. Entropy"));

        // Crew-level sources reach every agent, each passage once.
        let designer = requests[2].transcript();
        assert!(system_prompt(&requests[2]).starts_with("You are Web Designer"));
        assert!(designer.contains("[past questions] Past exam"));
        assert!(designer.contains("[main material] Entropy measures uncertainty"));
        assert_eq!(requests[0].transcript().matches("[main material]").count(), 1);
    }
}
